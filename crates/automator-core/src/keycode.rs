//! Symbolic key-token vocabulary
//!
//! Maps the short key names understood by the default string handler to
//! platform key codes.

/// Supported token → key code table
pub const KEY_CODES: &[(&str, u32)] = &[
    ("0", 48),
    ("1", 49),
    ("2", 50),
    ("3", 51),
    ("4", 52),
    ("5", 53),
    ("6", 54),
    ("7", 55),
    ("8", 56),
    ("9", 57),
    ("a", 65),
    ("b", 66),
    ("c", 67),
    ("d", 68),
    ("e", 69),
    ("f", 70),
    ("g", 71),
    ("h", 72),
    ("i", 73),
    ("j", 74),
    ("k", 75),
    ("l", 76),
    ("m", 77),
    ("n", 78),
    ("o", 79),
    ("p", 80),
    ("q", 81),
    ("r", 82),
    ("s", 83),
    ("t", 84),
    ("u", 85),
    ("v", 86),
    ("w", 87),
    ("x", 88),
    ("y", 89),
    ("z", 90),
    ("left", 37),
    ("up", 38),
    ("right", 39),
    ("down", 40),
    ("enter", 13),
    ("tab", 9),
    ("ctrl", 17),
    ("esc", 27),
    ("space", 32),
];

/// Look up the key code for a token
///
/// Matching is exact; `"A"` is not `"a"`.
pub fn key_code(token: &str) -> Option<u32> {
    KEY_CODES
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, code)| *code)
}
