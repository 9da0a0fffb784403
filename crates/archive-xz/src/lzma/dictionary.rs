//! The LZMA sliding-window dictionary: a ring buffer over already-decoded
//! output bytes, used to resolve match back-references. Every byte that
//! goes into the dictionary is also appended to the caller's output — the
//! ring only bounds how far back a match may reach, never what is emitted.

/// A fixed-capacity ring buffer of recently decoded bytes.
pub struct Dictionary {
    buf: Vec<u8>,
    cap: usize,
    pos: usize,
    full: bool,
}

impl Dictionary {
    /// Allocate a dictionary of `cap` bytes (the filter's declared
    /// LZMA2 dictionary size).
    pub fn new(cap: usize) -> Self {
        Dictionary { buf: vec![0u8; cap], cap, pos: 0, full: false }
    }

    /// Discard all history (LZMA2 "dictionary reset" chunk kind).
    pub fn reset(&mut self) {
        self.pos = 0;
        self.full = false;
    }

    /// Append one byte to the ring.
    pub fn push(&mut self, b: u8) {
        self.buf[self.pos] = b;
        self.pos += 1;
        if self.pos == self.cap {
            self.pos = 0;
            self.full = true;
        }
    }

    /// The byte `distance` positions behind the most recently pushed byte
    /// (`distance == 0` is the last byte pushed).
    pub fn byte_at_distance(&self, distance: u32) -> u8 {
        let distance = distance as usize + 1;
        let idx = if distance <= self.pos { self.pos - distance } else { self.cap - (distance - self.pos) };
        self.buf[idx]
    }

    /// Copy `len` bytes from `distance` positions back into `out`, pushing
    /// each copied byte into the ring as it goes (matches may legally
    /// overlap their own source region, i.e. run-length patterns).
    pub fn copy_match(&mut self, distance: u32, len: u32, out: &mut Vec<u8>) {
        for _ in 0..len {
            let b = self.byte_at_distance(distance);
            self.push(b);
            out.push(b);
        }
    }

    /// Total valid bytes currently held (capped at `cap`).
    pub fn available(&self) -> usize {
        if self.full {
            self.cap
        } else {
            self.pos
        }
    }
}
