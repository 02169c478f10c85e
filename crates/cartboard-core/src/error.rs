use std::fmt;

/// Fatal configuration problems detected while attaching a chip to a board.
///
/// These are reported to the cartridge loader before emulation starts; the
/// engine refuses to initialize rather than run with undefined bank counts.
#[derive(Debug)]
pub enum LoadError {
    /// The loader supplied no PRG ROM at all.
    EmptyPrgRom,
    /// No builtin chip (and no provider) claims this chip id.
    UnsupportedChip { id: u16 },
    /// A chip declared a window granularity that is zero, not a power of two,
    /// or does not divide its address class.
    BadGranularity {
        class: &'static str,
        granularity: usize,
    },
    /// A ROM image is not a whole number of banks at the declared granularity.
    RomNotBankAligned {
        class: &'static str,
        len: usize,
        granularity: usize,
    },
    /// Two decode rules match the same bus address.
    AmbiguousDecode { addr: u16, first: usize, second: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPrgRom => write!(f, "cartridge has no PRG ROM"),
            Self::UnsupportedChip { id } => write!(f, "chip {id} is not implemented"),
            Self::BadGranularity { class, granularity } => {
                write!(f, "{class} window granularity {granularity} is invalid")
            }
            Self::RomNotBankAligned {
                class,
                len,
                granularity,
            } => write!(
                f,
                "{class} image of {len} bytes is not a multiple of the {granularity} byte bank size"
            ),
            Self::AmbiguousDecode {
                addr,
                first,
                second,
            } => write!(
                f,
                "decode rules {first} and {second} both match address {addr:#06X}"
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// Save-state streams that cannot be applied.
///
/// `Board::load_state` parses the complete stream before touching any board
/// state, so a stream that fails with one of these leaves the running
/// instance exactly as it was.
#[derive(Debug)]
pub enum CorruptStateError {
    /// Stream does not start with the save-state magic bytes.
    BadMagic,
    /// Stream was produced by a newer, unknown format revision.
    UnsupportedVersion { found: u8 },
    /// Stream ended in the middle of a field record.
    Truncated,
    /// A variable-length field does not match the size this board expects.
    FieldSize {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for CorruptStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "missing save-state magic bytes"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported save-state format version {found}")
            }
            Self::Truncated => write!(f, "save-state stream ended unexpectedly"),
            Self::FieldSize {
                field,
                expected,
                actual,
            } => write!(
                f,
                "field {field} expected {expected} bytes, got {actual}"
            ),
        }
    }
}

impl std::error::Error for CorruptStateError {}
