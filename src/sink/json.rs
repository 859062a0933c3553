use super::DecisionSink;
use crate::decision::Decision;
use crate::error::SinkError;
use parking_lot::Mutex;
use std::io::Write;

/// One JSON object per line.
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> DecisionSink for JsonLinesSink<W> {
    fn record(&self, decision: &Decision) -> Result<(), SinkError> {
        let line = serde_json::to_string(decision)?;
        let mut out = self.out.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Action, DecisionContext, DecisionPipeline, DecisionPolicy, Thresholds};
    use crate::rules::RuleFlag;

    #[test]
    fn writes_one_line_per_decision() {
        let p = DecisionPipeline::new(DecisionPolicy::default(), Thresholds::new(0.2, 0.5, 0.8).ok())
            .unwrap();
        let sink = JsonLinesSink::new(Vec::new());
        let d = p
            .decide(0.1, 0.15, &[RuleFlag::NewIp], DecisionContext::new())
            .unwrap();
        sink.record(&d).unwrap();
        sink.record(&d).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: Decision = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(back.action, Action::Allow);
        assert!(lines[0].contains(r#""action":"ALLOW""#));
        assert!(lines[0].contains(r#""rule_flags":["new_ip"]"#));
    }
}
