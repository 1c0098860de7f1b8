use std::collections::VecDeque;

use crate::{constant::DIGEST_BYTES, crypto::keccak::keccak256};

const TAG_ABSORB: u8 = 0x00;
const TAG_SQUEEZE: u8 = 0x01;
const TAG_RATCHET: u8 = 0x02;

/// The hash a [`KeccakSponge`] runs on.
///
/// Implemented natively over `u8` and, in [`super::replay`], over circuit byte wires. The sponge
/// logic is shared, so both sides derive the same challenges by construction.
pub trait SpongeHasher {
    type Byte: Copy;

    fn constant(&mut self, byte: u8) -> Self::Byte;

    fn hash(&mut self, input: &[Self::Byte]) -> [Self::Byte; DIGEST_BYTES];
}

/// Keccak-256 on plain bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKeccak;

impl SpongeHasher for NativeKeccak {
    type Byte = u8;

    fn constant(&mut self, byte: u8) -> u8 {
        byte
    }

    fn hash(&mut self, input: &[u8]) -> [u8; DIGEST_BYTES] {
        keccak256(input)
    }
}

#[derive(Debug, Clone)]
struct SqueezeStream<B> {
    counter: u64,
    buffer: VecDeque<B>,
}

/// A byte-oriented hash-chain sponge.
///
/// - absorbed bytes are buffered until the next squeeze or ratchet;
/// - the first squeeze after an absorb rekeys `state = H(0x00 ‖ state ‖ pending)`;
/// - squeezed bytes come from the stream `H(0x01 ‖ state ‖ counter)`, counter little-endian;
/// - a ratchet sets `state = H(0x02 ‖ state ‖ pending)`.
///
/// Splitting or merging consecutive operations of the same kind does not change any output.
#[derive(Debug, Clone)]
pub struct KeccakSponge<B> {
    state: [B; DIGEST_BYTES],
    pending: Vec<B>,
    stream: Option<SqueezeStream<B>>,
}

impl<B: Copy> KeccakSponge<B> {
    pub const fn from_state(state: [B; DIGEST_BYTES]) -> Self {
        Self {
            state,
            pending: Vec::new(),
            stream: None,
        }
    }

    /// Buffer `input`. An empty input is a no-op.
    pub fn absorb(&mut self, input: &[B]) {
        if input.is_empty() {
            return;
        }
        self.stream = None;
        self.pending.extend_from_slice(input);
    }

    pub fn squeeze<H: SpongeHasher<Byte = B>>(&mut self, hasher: &mut H, len: usize) -> Vec<B> {
        if len == 0 {
            return Vec::new();
        }
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                self.state = self.rekey(hasher, TAG_ABSORB);
                SqueezeStream {
                    counter: 0,
                    buffer: VecDeque::new(),
                }
            }
        };

        while stream.buffer.len() < len {
            let mut input = Vec::with_capacity(1 + DIGEST_BYTES + 8);
            input.push(hasher.constant(TAG_SQUEEZE));
            input.extend_from_slice(&self.state);
            input.extend(stream.counter.to_le_bytes().map(|b| hasher.constant(b)));
            stream.buffer.extend(hasher.hash(&input));
            stream.counter += 1;
        }

        let out = stream.buffer.drain(..len).collect();
        self.stream = Some(stream);
        out
    }

    pub fn ratchet<H: SpongeHasher<Byte = B>>(&mut self, hasher: &mut H) {
        self.state = self.rekey(hasher, TAG_RATCHET);
        self.stream = None;
    }

    fn rekey<H: SpongeHasher<Byte = B>>(&mut self, hasher: &mut H, tag: u8) -> [B; DIGEST_BYTES] {
        let mut input = Vec::with_capacity(1 + DIGEST_BYTES + self.pending.len());
        input.push(hasher.constant(tag));
        input.extend_from_slice(&self.state);
        input.append(&mut self.pending);
        hasher.hash(&input)
    }
}

impl KeccakSponge<u8> {
    /// A native sponge seeded from a compiled pattern's initial state.
    pub const fn new(initial_state: [u8; DIGEST_BYTES]) -> Self {
        Self::from_state(initial_state)
    }
}
