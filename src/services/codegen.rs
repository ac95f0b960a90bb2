use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::config::{ShortCodeConfig, ShortCodeStrategy};

const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Derives candidate short codes for a URL.
///
/// `attempt` starts at 0 and grows after each collision with a different URL.
pub trait ShortCodeGenerator: Send + Sync {
    fn generate(&self, url: &str, attempt: u32) -> String;
}

/// Hex prefix of the SHA-256 of the URL, so the same URL always maps to the same code
#[derive(Debug, Clone)]
pub struct HashCodeGenerator {
    length: usize,
}

impl HashCodeGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(4, 64),
        }
    }
}

impl ShortCodeGenerator for HashCodeGenerator {
    fn generate(&self, url: &str, attempt: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        if attempt > 0 {
            hasher.update(attempt.to_be_bytes());
        }
        let digest = hasher.finalize();

        let mut code: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        code.truncate(self.length);
        code
    }
}

#[derive(Debug, Clone)]
pub struct RandomCodeGenerator {
    length: usize,
}

impl RandomCodeGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(4),
        }
    }
}

impl ShortCodeGenerator for RandomCodeGenerator {
    fn generate(&self, _url: &str, _attempt: u32) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| BASE62[rng.random_range(0..BASE62.len())] as char)
            .collect()
    }
}

pub fn generator_from_config(config: &ShortCodeConfig) -> Box<dyn ShortCodeGenerator> {
    match config.strategy {
        ShortCodeStrategy::Hash => Box::new(HashCodeGenerator::new(config.length)),
        ShortCodeStrategy::Random => Box::new(RandomCodeGenerator::new(config.length)),
    }
}
