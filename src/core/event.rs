// Frame -> named event. Only the `event:` and `data:` fields are recognized.

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Event {
    pub name: String,
    pub data: String,
}

impl Event {
    /// Both fields set; anything else is never handed to a validator.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.data.is_empty()
    }
}

/// Parses one frame. Repeated `data:` lines are not concatenated; the last one wins.
pub fn parse_event(frame: &str) -> Event {
    let mut event = Event::default();
    for line in frame.split('\n') {
        if let Some(name) = line.strip_prefix("event:") {
            event.name = name.trim().to_string();
        }
        if let Some(data) = line.strip_prefix("data:") {
            event.data = data.trim().to_string();
        }
    }
    event
}

#[cfg(test)]
mod tests {
    use super::{Event, parse_event};

    #[test]
    fn parses_name_and_data() {
        let event = parse_event("event: repo\ndata: {\"Name\":\"r\"}");
        assert_eq!(
            event,
            Event {
                name: "repo".to_string(),
                data: "{\"Name\":\"r\"}".to_string(),
            }
        );
        assert!(event.is_complete());
    }

    #[test]
    fn frame_without_event_line_is_incomplete() {
        let event = parse_event("data: {\"Name\":\"r\"}");
        assert_eq!(event.name, "");
        assert_eq!(event.data, "{\"Name\":\"r\"}");
        assert!(!event.is_complete());
    }

    #[test]
    fn frame_without_data_line_is_incomplete() {
        let event = parse_event("event: repo");
        assert_eq!(event.name, "repo");
        assert!(!event.is_complete());
    }

    #[test]
    fn empty_frame_parses_to_empty_event() {
        assert_eq!(parse_event(""), Event::default());
    }

    #[test]
    fn last_data_line_wins() {
        let event = parse_event("event: repo\ndata: first\ndata: second");
        assert_eq!(event.data, "second");
    }

    #[test]
    fn ignores_id_retry_and_comments() {
        let event = parse_event(": keepalive\nid: 7\nretry: 1000\nevent:fetch\ndata:{}");
        assert_eq!(event.name, "fetch");
        assert_eq!(event.data, "{}");
    }

    #[test]
    fn carriage_returns_are_trimmed_from_values() {
        let event = parse_event("event: repo\r\ndata: {}\r");
        assert_eq!(event.name, "repo");
        assert_eq!(event.data, "{}");
    }
}
