//! Pitch-class and note naming shared by the key and pitch detectors

/// Names of the twelve pitch classes, index 0 = C
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name of a pitch class (0 = C .. 11 = B)
pub fn pitch_class_name(pitch_class: u8) -> &'static str {
    PITCH_CLASS_NAMES[(pitch_class % 12) as usize]
}

/// Full note name with octave for a MIDI note number, e.g. 69 -> "A4"
pub fn note_name(midi_note: i32) -> String {
    let pitch_class = ((midi_note % 12) + 12) % 12;
    let octave = midi_note.div_euclid(12) - 1;
    format!("{}{}", PITCH_CLASS_NAMES[pitch_class as usize], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_is_midi_69() {
        assert_eq!(note_name(69), "A4");
    }

    #[test]
    fn test_middle_c() {
        assert_eq!(note_name(60), "C4");
    }

    #[test]
    fn test_sharp_names() {
        assert_eq!(note_name(61), "C#4");
        assert_eq!(pitch_class_name(10), "A#");
    }

    #[test]
    fn test_negative_midi_wraps() {
        // MIDI 0 is C-1; below that the octave keeps descending
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(-1), "B-2");
    }
}
