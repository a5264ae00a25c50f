use serde::{Deserialize, Serialize};

/// A single timestamped reading pushed by the brace, either an angle in
/// degrees or a force in pounds. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A captured force sample tagged with whether it fell inside the capture
/// interval at the time the result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaggedSample {
    #[serde(flatten)]
    pub sample: Sample,
    pub relevant: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_sample_serializes_flat() {
        let tagged = TaggedSample {
            sample: Sample::new(42, 1.5),
            relevant: true,
        };
        let json = serde_json::to_value(tagged).unwrap();
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["value"], 1.5);
        assert_eq!(json["relevant"], true);
    }
}
