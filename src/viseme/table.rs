//! Static tables into the shared viseme alphabet.
//!
//! Two sources feed the renderer:
//! - ARPABET phonemes from the pronunciation dictionary (alignment path).
//! - Vendor viseme ids (Azure-style 0–21 set) from event-emitting
//!   synthesizers.
//!
//! Both are immutable process-wide data.

use super::VisemeShape;

/// ARPABET phoneme to viseme mapping.
///
/// Expects a bare symbol (stress digit already stripped). Returns `None` for
/// symbols outside ARPABET so custom dictionaries with stray symbols only
/// lose that phoneme.
pub fn phoneme_to_viseme(phoneme: &str) -> Option<VisemeShape> {
    let shape = match phoneme {
        // Bilabial: lips together
        "B" | "P" | "M" | "EM" => VisemeShape::PP,

        // Labiodental: teeth on lip
        "F" | "V" => VisemeShape::FF,

        // Dental: tongue between teeth
        "TH" | "DH" => VisemeShape::TH,

        // Alveolar stops
        "T" | "D" | "DX" => VisemeShape::DD,

        // Alveolar nasal / lateral
        "N" | "NX" | "EN" | "L" | "EL" => VisemeShape::NN,

        // Velar: back of tongue
        "K" | "G" | "NG" => VisemeShape::KK,

        // Postalveolar
        "CH" | "JH" | "SH" | "ZH" => VisemeShape::CH,

        // Alveolar sibilants
        "S" | "Z" => VisemeShape::SS,

        "R" | "ER" | "AXR" => VisemeShape::RR,

        // Vowels
        "AA" | "AO" | "AW" | "AY" => VisemeShape::AA,
        "AE" | "AH" | "AX" | "EH" | "HH" => VisemeShape::E,
        "EY" | "IH" | "IX" | "IY" | "Y" => VisemeShape::I,
        "OW" | "OY" | "UH" => VisemeShape::O,
        "UW" | "UX" | "W" | "WH" => VisemeShape::U,

        _ => return None,
    };
    Some(shape)
}

/// Vendor viseme ids (index) to shared alphabet, following the vendor's
/// 22-id enumeration:
///
/// | id | vendor sounds | id | vendor sounds |
/// |----|---------------|----|---------------|
/// | 0 | silence | 11 | aɪ |
/// | 1 | æ ə ʌ | 12 | h |
/// | 2 | ɑ | 13 | ɹ |
/// | 3 | ɔ | 14 | l |
/// | 4 | ɛ ʊ | 15 | s z |
/// | 5 | ɝ | 16 | ʃ tʃ dʒ ʒ |
/// | 6 | j i ɪ | 17 | ð |
/// | 7 | w u | 18 | f v |
/// | 8 | o | 19 | d t n θ |
/// | 9 | aʊ | 20 | k g ŋ |
/// | 10 | ɔɪ | 21 | p b m |
///
/// Must stay in sync with every id the vendor can emit.
pub const VENDOR_VISEME_TABLE: [VisemeShape; 22] = [
    VisemeShape::Sil,
    VisemeShape::E,
    VisemeShape::AA,
    VisemeShape::O,
    VisemeShape::E,
    VisemeShape::RR,
    VisemeShape::I,
    VisemeShape::U,
    VisemeShape::O,
    VisemeShape::AA,
    VisemeShape::O,
    VisemeShape::AA,
    VisemeShape::E,
    VisemeShape::RR,
    VisemeShape::NN,
    VisemeShape::SS,
    VisemeShape::CH,
    VisemeShape::TH,
    VisemeShape::FF,
    VisemeShape::DD,
    VisemeShape::KK,
    VisemeShape::PP,
];

/// Look up a vendor viseme id. `None` means the table is out of date.
pub fn vendor_to_viseme(vendor_id: u32) -> Option<VisemeShape> {
    usize::try_from(vendor_id)
        .ok()
        .and_then(|idx| VENDOR_VISEME_TABLE.get(idx))
        .copied()
}
