use sha2::{Digest as _, Sha256, Sha512};
use streamftp_protocol::HashAlgorithm;

/// Unsupported or unspecified algorithm.
pub const ERR_UNSUPPORTED: i32 = -1;
/// `update`/`finalize` called before a successful `initialize`.
pub const ERR_NOT_INITIALIZED: i32 = -2;
/// Any call after `finalize`.
pub const ERR_FINALIZED: i32 = -3;
/// The primitive produced a digest of unexpected length.
pub const ERR_DIGEST_SIZE: i32 = -4;

/// Error returned by the digest engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("hasher: ({code}) {message}")]
pub struct HashError {
    pub code: i32,
    pub message: String,
}

impl HashError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

enum Engine {
    Sha256(Sha256),
    Sha512(Sha512),
}

enum State {
    Idle,
    Active(Engine),
    Finalized,
}

/// Streaming digest over one byte sequence.
///
/// Lifecycle: [`initialize`](Self::initialize), any number of
/// [`update`](Self::update) calls, then exactly one
/// [`finalize`](Self::finalize). A finalized hasher is terminal; create a new
/// one for the next file.
pub struct Hasher {
    algorithm: HashAlgorithm,
    state: State,
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            state: State::Idle,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Prepares the internal state. Fails for unsupported algorithms.
    pub fn initialize(&mut self) -> Result<(), HashError> {
        if matches!(self.state, State::Finalized) {
            return Err(HashError::new(ERR_FINALIZED, "hasher already finalized"));
        }
        let engine = match self.algorithm {
            HashAlgorithm::Sha256 => Engine::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Engine::Sha512(Sha512::new()),
            HashAlgorithm::Unspecified => {
                return Err(HashError::new(
                    ERR_UNSUPPORTED,
                    format!("unsupported hash type: {}", self.algorithm),
                ));
            }
        };
        self.state = State::Active(engine);
        Ok(())
    }

    /// Feeds `data` into the digest. Empty input is a no-op.
    pub fn update(&mut self, data: &[u8]) -> Result<(), HashError> {
        if data.is_empty() {
            return Ok(());
        }
        match &mut self.state {
            State::Active(Engine::Sha256(h)) => h.update(data),
            State::Active(Engine::Sha512(h)) => h.update(data),
            State::Idle => {
                return Err(HashError::new(
                    ERR_NOT_INITIALIZED,
                    "update called before initialize",
                ));
            }
            State::Finalized => {
                return Err(HashError::new(ERR_FINALIZED, "update called after finalize"));
            }
        }
        Ok(())
    }

    /// Returns the fixed-size digest and moves to the terminal state.
    pub fn finalize(&mut self) -> Result<Vec<u8>, HashError> {
        let engine = match std::mem::replace(&mut self.state, State::Finalized) {
            State::Active(engine) => engine,
            State::Idle => {
                self.state = State::Idle;
                return Err(HashError::new(
                    ERR_NOT_INITIALIZED,
                    "finalize called before initialize",
                ));
            }
            State::Finalized => {
                return Err(HashError::new(ERR_FINALIZED, "hasher already finalized"));
            }
        };

        let digest = match engine {
            Engine::Sha256(h) => h.finalize().to_vec(),
            Engine::Sha512(h) => h.finalize().to_vec(),
        };
        if digest.len() != self.algorithm.digest_len() {
            return Err(HashError::new(
                ERR_DIGEST_SIZE,
                format!("invalid digest size: {}", digest.len()),
            ));
        }
        Ok(digest)
    }
}

/// Computes the digest of `data` in one call.
pub fn digest_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, HashError> {
    let mut hasher = Hasher::new(algorithm);
    hasher.initialize()?;
    hasher.update(data)?;
    hasher.finalize()
}
