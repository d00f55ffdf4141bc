use hashbrown::HashSet;

/// Errors produced while hashing an asset name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("asset names must not be empty")]
    EmptyName,
}

/// Archive-wide parameters of the name hash.
///
/// Stored in the archive header so the reader recomputes exactly the hashes the
/// writer produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashParams {
    pub prime: u32,
    /// How many leading characters feed the hash (cycling when longer than the name).
    pub start_chars: u32,
    /// How many trailing characters feed the hash.
    pub end_chars: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            prime: 31,
            start_chars: 16,
            end_chars: 16,
        }
    }
}

/// Primes tried, in order, by [`HashParams::find_collision_free`].
const PRIME_LADDER: [u32; 12] = [31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79];

/// How many times the character windows are doubled during the search.
const WINDOW_DOUBLINGS: u32 = 4;

impl HashParams {
    pub fn new(prime: u32, start_chars: u32, end_chars: u32) -> Self {
        Self {
            prime,
            start_chars,
            end_chars,
        }
    }

    /// Hash `name` under these parameters. See [`hash_name`].
    pub fn hash(&self, name: &str) -> Result<u64, HashError> {
        hash_name(name, self.prime, self.start_chars, self.end_chars)
    }

    /// Search for parameters under which every name in `names` hashes uniquely.
    ///
    /// Starts from `start` and walks a fixed ladder of primes, doubling both
    /// character windows after each full pass over the ladder. Returns `Ok(None)`
    /// when the ladder is exhausted, which in practice means `names` contains
    /// duplicates.
    pub fn find_collision_free<S: AsRef<str>>(
        names: &[S],
        start: HashParams,
    ) -> Result<Option<HashParams>, HashError> {
        if names.iter().any(|n| n.as_ref().is_empty()) {
            return Err(HashError::EmptyName);
        }

        for doubling in 0..WINDOW_DOUBLINGS {
            let start_chars = start.start_chars.max(1) << doubling;
            let end_chars = start.end_chars.max(1) << doubling;
            let primes = std::iter::once(start.prime)
                .chain(PRIME_LADDER.iter().copied().filter(|&p| p != start.prime));

            for prime in primes {
                let candidate = HashParams::new(prime, start_chars, end_chars);
                if candidate.is_collision_free(names)? {
                    return Ok(Some(candidate));
                }
            }
        }
        Ok(None)
    }

    fn is_collision_free<S: AsRef<str>>(&self, names: &[S]) -> Result<bool, HashError> {
        let mut seen = HashSet::with_capacity(names.len());
        for name in names {
            if !seen.insert(self.hash(name.as_ref())?) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Rolling polynomial hash over a prefix window and a suffix window of `name`.
///
/// ```text
/// value = len(name)
/// for i in 0..start_chars: value += (name[i mod n] - 33) * prime^k   (k = 1, 2, ...)
/// for i in 0..end_chars:   value += (name[(n - i) mod n] - 33) * prime^k
/// ```
///
/// The exponent `k` keeps counting across both windows. All arithmetic wraps at
/// 64 bits; bytes below 33 wrap too rather than failing.
pub fn hash_name(name: &str, prime: u32, start_chars: u32, end_chars: u32) -> Result<u64, HashError> {
    let bytes = name.as_bytes();
    let n = bytes.len();
    if n == 0 {
        return Err(HashError::EmptyName);
    }

    let prime = prime as u64;
    let mut value = n as u64;
    // prime^1, prime^2, ... computed incrementally
    let mut factor = prime;

    let start = (0..start_chars as usize).map(|i| bytes[i % n]);
    let end = (0..end_chars as usize).map(|i| bytes[(n - i % n) % n]);

    for byte in start.chain(end) {
        let weight = (byte as u64).wrapping_sub(33);
        value = value.wrapping_add(weight.wrapping_mul(factor));
        factor = factor.wrapping_mul(prime);
    }

    Ok(value)
}
