/// Fatal configuration errors. All of these are detected up front and are
/// never produced per enumerated candidate.
#[derive(Debug, Fail)]
pub enum MitmError {
    #[fail(
        display = "key segments add up to {} bytes, cipher key is {} bytes",
        actual, expected
    )]
    KeyLengthMismatch { expected: usize, actual: usize },

    #[fail(display = "truncation length must be between 1 and {}, got {}", max, got)]
    InvalidTruncationLength { max: usize, got: usize },

    #[fail(display = "suffix width must be between 1 and {} bits, got {}", max, got)]
    InvalidSuffixWidth { max: u32, got: u32 },

    #[fail(
        display = "ciphertext length {} does not match padded plaintext length {}",
        ciphertext, padded
    )]
    CiphertextLengthMismatch { ciphertext: usize, padded: usize },

    #[fail(display = "worker count must be at least 1")]
    NoWorkers,
}
