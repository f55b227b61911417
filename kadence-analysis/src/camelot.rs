//! Musical keys and Camelot wheel notation for harmonic mixing
//!
//! Maps (tonic, mode) pairs to Camelot notation (1A-12B) and provides
//! compatibility checking for harmonic mixing.

use std::fmt;

/// Pitch class names, index 0 = C
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Returned by [`camelot_code`] for inputs outside the 24 known keys
pub const UNKNOWN_CAMELOT: &str = "??";

/// Frequencies of the 4th octave (C4..B4), used to voice reference triads
const OCTAVE_4_FREQS: [f32; 12] = [
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16,
    493.88,
];

/// Key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    /// Iteration order used everywhere a tie has to be broken: major first
    pub const ALL: [Mode; 2] = [Mode::Major, Mode::Minor];

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }

    /// Parse "major"/"maj"/"minor"/"min"/"m" (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" => Some(Mode::Major),
            "minor" | "min" | "m" => Some(Mode::Minor),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Musical key: a tonic pitch class (0-11, 0 = C) and a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    root: u8,
    mode: Mode,
}

impl Key {
    /// Create a key; the root is taken modulo 12
    pub const fn new(root: u8, mode: Mode) -> Self {
        Self {
            root: root % 12,
            mode,
        }
    }

    pub const fn major(root: u8) -> Self {
        Self::new(root, Mode::Major)
    }

    pub const fn minor(root: u8) -> Self {
        Self::new(root, Mode::Minor)
    }

    /// Tonic pitch class (0-11)
    pub fn root(&self) -> u8 {
        self.root
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_major(&self) -> bool {
        self.mode == Mode::Major
    }

    /// Tonic note name using sharps ("C#", not "Db")
    pub fn note_name(&self) -> &'static str {
        NOTE_NAMES[self.root as usize]
    }

    /// Dense index 0..24: majors C..B, then minors C..B
    pub fn index(&self) -> usize {
        match self.mode {
            Mode::Major => self.root as usize,
            Mode::Minor => 12 + self.root as usize,
        }
    }

    /// Inverse of [`Key::index`]
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0..=11 => Some(Self::major(index as u8)),
            12..=23 => Some(Self::minor((index - 12) as u8)),
            _ => None,
        }
    }

    /// All 24 keys in tie-break order (majors then minors, roots ascending)
    pub fn all() -> impl Iterator<Item = Key> {
        (0..24).filter_map(Key::from_index)
    }

    /// Same mode, root moved by `semitones` (wraps around the octave)
    pub fn transpose(&self, semitones: i32) -> Self {
        let root = (self.root as i32 + semitones).rem_euclid(12) as u8;
        Self::new(root, self.mode)
    }

    /// Root, third, fifth and octave frequencies voiced from the 4th octave
    ///
    /// Useful for auditioning a detected key against the track.
    pub fn triad_frequencies(&self) -> [f32; 4] {
        let third = match self.mode {
            Mode::Major => 4,
            Mode::Minor => 3,
        };
        let base = OCTAVE_4_FREQS[self.root as usize];
        [0, third, 7, 12].map(|semitones| base * 2f32.powf(semitones as f32 / 12.0))
    }

    /// Parse "A major", "F# minor", "Bb min", "Am" or "C"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (note, mode) = match s.split_once(char::is_whitespace) {
            Some((note, mode)) => (note, Mode::parse(mode)?),
            None => match s.strip_suffix('m') {
                Some(note) if !note.is_empty() => (note, Mode::Minor),
                _ => (s, Mode::Major),
            },
        };
        Some(Self::new(parse_note(note)?, mode))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.note_name(), self.mode)
    }
}

/// Parse a note name with optional sharp or flat ("C", "c#", "Db")
pub fn parse_note(note: &str) -> Option<u8> {
    let mut chars = note.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let natural: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let accidental = match chars.as_str() {
        "" => 0,
        "#" | "♯" => 1,
        "b" | "♭" => -1,
        _ => return None,
    };
    Some((natural + accidental).rem_euclid(12) as u8)
}

/// The Camelot wheel, one entry per key, minor keys "nA" and major keys "nB"
///
/// Relative major/minor pairs share a number.
const CAMELOT_TABLE: [(Key, u8); 24] = [
    (Key::major(0), 8),
    (Key::major(1), 3),
    (Key::major(2), 10),
    (Key::major(3), 5),
    (Key::major(4), 12),
    (Key::major(5), 7),
    (Key::major(6), 2),
    (Key::major(7), 9),
    (Key::major(8), 4),
    (Key::major(9), 11),
    (Key::major(10), 6),
    (Key::major(11), 1),
    (Key::minor(0), 5),
    (Key::minor(1), 12),
    (Key::minor(2), 7),
    (Key::minor(3), 2),
    (Key::minor(4), 9),
    (Key::minor(5), 4),
    (Key::minor(6), 11),
    (Key::minor(7), 6),
    (Key::minor(8), 1),
    (Key::minor(9), 8),
    (Key::minor(10), 3),
    (Key::minor(11), 10),
];

const MINOR_CODES: [&str; 12] = [
    "1A", "2A", "3A", "4A", "5A", "6A", "7A", "8A", "9A", "10A", "11A", "12A",
];

const MAJOR_CODES: [&str; 12] = [
    "1B", "2B", "3B", "4B", "5B", "6B", "7B", "8B", "9B", "10B", "11B", "12B",
];

/// Camelot code for a note name and mode name, or `"??"` if either is unknown
pub fn camelot_code(note: &str, mode: &str) -> &'static str {
    match (parse_note(note), Mode::parse(mode)) {
        (Some(root), Some(mode)) => CamelotKey::from_key(Key::new(root, mode)).code(),
        _ => UNKNOWN_CAMELOT,
    }
}

/// Camelot wheel notation (1A-12B)
///
/// - Numbers 1-12 represent positions on the wheel
/// - 'A' suffix = minor keys
/// - 'B' suffix = major keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CamelotKey {
    /// Position on the wheel (1-12)
    pub number: u8,
    /// true = B (major), false = A (minor)
    pub is_major: bool,
}

impl CamelotKey {
    pub fn new(number: u8, is_major: bool) -> Option<Self> {
        if (1..=12).contains(&number) {
            Some(Self { number, is_major })
        } else {
            None
        }
    }

    pub fn from_key(key: Key) -> Self {
        let (_, number) = CAMELOT_TABLE[key.index()];
        Self {
            number,
            is_major: key.is_major(),
        }
    }

    pub fn to_key(&self) -> Key {
        CAMELOT_TABLE
            .iter()
            .find(|(key, number)| *number == self.number && key.is_major() == self.is_major)
            .map(|(key, _)| *key)
            .unwrap_or(if self.is_major {
                Key::major(0)
            } else {
                Key::minor(9)
            })
    }

    /// Static display string ("8A", "12B")
    pub fn code(&self) -> &'static str {
        let idx = (self.number.clamp(1, 12) - 1) as usize;
        if self.is_major {
            MAJOR_CODES[idx]
        } else {
            MINOR_CODES[idx]
        }
    }

    pub fn display(&self) -> String {
        self.code().to_string()
    }

    /// Parse from string (e.g., "8A", "12B")
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() < 2 {
            return None;
        }

        let last = s.chars().last()?;
        let is_major = match last.to_ascii_uppercase() {
            'B' => true,
            'A' => false,
            _ => return None,
        };

        let number: u8 = s[..s.len() - 1].parse().ok()?;
        Self::new(number, is_major)
    }

    /// Same key, relative major/minor, or adjacent number with the same letter
    pub fn is_compatible(&self, other: &CamelotKey) -> bool {
        self.wheel_distance(other) <= 1
    }

    /// 0 for the same key, 1 for relative or adjacent keys, larger when further apart
    pub fn wheel_distance(&self, other: &CamelotKey) -> u8 {
        let mode_diff = u8::from(self.is_major != other.is_major);
        self.number_distance(other) + mode_diff
    }

    /// Shortest distance around the wheel, ignoring the letter
    fn number_distance(&self, other: &CamelotKey) -> u8 {
        let d = (self.number as i8 - other.number as i8).unsigned_abs();
        d.min(12 - d)
    }

    /// Self, relative key, and both neighbours on the wheel
    pub fn compatible_keys(&self) -> Vec<CamelotKey> {
        let prev = if self.number == 1 { 12 } else { self.number - 1 };
        let next = if self.number == 12 { 1 } else { self.number + 1 };
        vec![
            *self,
            CamelotKey {
                number: self.number,
                is_major: !self.is_major,
            },
            CamelotKey {
                number: prev,
                is_major: self.is_major,
            },
            CamelotKey {
                number: next,
                is_major: self.is_major,
            },
        ]
    }
}

impl From<Key> for CamelotKey {
    fn from(key: Key) -> Self {
        Self::from_key(key)
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
