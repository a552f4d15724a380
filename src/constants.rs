/// Default filename for the append-only record log within a store directory.
pub(crate) const LOG_FILENAME: &str = "records.log";

/// Frame boundary token. A frame starts with this token on a line of its
/// own, followed by the identifier line and the serialized record. The
/// token is deliberately improbable: serde_json emits records as a single
/// brace-delimited line, so a payload line can never equal it and be
/// mistaken for a boundary.
pub(crate) const FRAME_SEPARATOR: &str = "--%0b7c9e4a1f!frame!--";
