//! Console output for listener events

use std::io::{self, Write};

use rfid_core::{ListenerEvent, ScanCode, ScanDisplay};

/// Prints listener events to a writer
///
/// In JSON mode every event becomes one status record per line, for
/// external monitoring. Otherwise the status line and scanned codes are
/// printed as text.
pub struct ConsoleDisplay<W: Write> {
    out: W,
    json_status: bool,
    status: Option<String>,
    code: Option<ScanCode>,
    line: Option<String>,
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W, json_status: bool) -> Self {
        Self {
            out,
            json_status,
            status: None,
            code: None,
            line: None,
        }
    }

    /// Show one event
    pub fn handle(&mut self, event: &ListenerEvent) -> io::Result<()> {
        event.dispatch(self);

        let line = if self.json_status {
            Some(event.to_record().to_json())
        } else {
            self.line.take()
        };

        if let Some(line) = line {
            writeln!(self.out, "{}", line)?;
            self.out.flush()?;
        }
        Ok(())
    }

    /// Last status shown
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Last code scanned
    pub fn code(&self) -> Option<&ScanCode> {
        self.code.as_ref()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ScanDisplay for ConsoleDisplay<W> {
    fn update_status(&mut self, status: &str) {
        self.line = Some(format!("Status: {}", status));
        self.status = Some(status.to_string());
    }

    fn update_data(&mut self, code: &ScanCode) {
        self.line = Some(format!("Scanned Code: {}", code));
        self.code = Some(code.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfid_core::DecodeError;

    fn events() -> Vec<ListenerEvent> {
        vec![
            ListenerEvent::Connected {
                port: "/dev/ttyUSB0".to_string(),
            },
            ListenerEvent::Data {
                code: ScanCode::from(6699),
            },
            ListenerEvent::DecodeWarning {
                error: DecodeError::InvalidHex {
                    digits: "GG".to_string(),
                },
            },
        ]
    }

    fn render(json_status: bool) -> (String, Option<String>, Option<ScanCode>) {
        let mut display = ConsoleDisplay::new(Vec::new(), json_status);
        for event in events() {
            display.handle(&event).unwrap();
        }
        let status = display.status().map(str::to_string);
        let code = display.code().cloned();
        let output = String::from_utf8(display.into_inner()).unwrap();
        (output, status, code)
    }

    #[test]
    fn test_json_output() {
        let (output, _, _) = render(true);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            r#"{"code":20,"message":"Successfully connected on /dev/ttyUSB0"}"#
        );
        assert_eq!(lines[1], r#"{"code":30,"data":6699}"#);

        let warning: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(warning["code"], 40);
        assert!(warning["message"]
            .as_str()
            .unwrap()
            .starts_with("Warning: could not decode line"));
    }

    #[test]
    fn test_text_output() {
        let (output, _, _) = render(false);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "Status: Successfully connected on /dev/ttyUSB0");
        assert_eq!(lines[1], "Scanned Code: 6699");
        assert!(lines[2].starts_with("Status: Warning:"));
    }

    #[test]
    fn test_warning_keeps_last_code() {
        let (_, status, code) = render(false);

        assert_eq!(code, Some(ScanCode::from(6699)));
        assert!(status.unwrap().starts_with("Warning:"));
    }
}
