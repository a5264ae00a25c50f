use serde::{Deserialize, Serialize};

/// Whether a session records a reference point or a regular measurement.
/// Aggregation is identical; only storage differs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Regular,
    Baseline,
}

impl SessionMode {
    pub fn is_baseline(&self) -> bool {
        matches!(self, SessionMode::Baseline)
    }
}

/// The five phases of a measurement session, in order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
pub enum SessionStep {
    Preparation,
    BendToMax,
    StrengthSetup,
    CompleteRom,
    Finalize,
}

/// Text shown to the operator for a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub title: String,
    pub text: String,
    /// Label of the button that fires the step's trigger.
    pub action: &'static str,
}

impl SessionStep {
    pub const ALL: [SessionStep; 5] = [
        SessionStep::Preparation,
        SessionStep::BendToMax,
        SessionStep::StrengthSetup,
        SessionStep::CompleteRom,
        SessionStep::Finalize,
    ];

    /// 1-based position, as shown to the operator.
    pub fn index(&self) -> u8 {
        match self {
            SessionStep::Preparation => 1,
            SessionStep::BendToMax => 2,
            SessionStep::StrengthSetup => 3,
            SessionStep::CompleteRom => 4,
            SessionStep::Finalize => 5,
        }
    }

    /// Steps during which the angle stream feeds the running maximum.
    pub fn tracks_max(&self) -> bool {
        matches!(
            self,
            SessionStep::BendToMax | SessionStep::StrengthSetup | SessionStep::CompleteRom
        )
    }

    /// `capture_secs` is the length of the strength push announced in step 3.
    pub fn instruction(&self, mode: SessionMode, capture_secs: u32) -> Instruction {
        let tag = if mode.is_baseline() { " (Baseline)" } else { "" };
        let end_action = end_action_label(mode);

        match self {
            SessionStep::Preparation => Instruction {
                title: format!("Step 1: Preparation{tag}"),
                text: "Start with your arm fully extended. Ensure the device is securely fitted. \
                       Press 'Start Bending Arm' when ready."
                    .to_string(),
                action: "Start Bending Arm",
            },
            SessionStep::BendToMax => Instruction {
                title: format!("Step 2: Bend to Maximum ROM{tag}"),
                text: "Slowly bend your arm to the maximum comfortable angle. The device will \
                       track your range of motion. Press 'Reached Maximum Angle' when you can't \
                       bend further."
                    .to_string(),
                action: "Reached Maximum Angle",
            },
            SessionStep::StrengthSetup => Instruction {
                title: format!("Step 3: Strength Test Setup{tag}"),
                text: format!(
                    "Lock the brace at your maximum angle. When ready, press 'Start Strength \
                     Test' and PUSH against the brace with maximum force for {capture_secs} \
                     seconds."
                ),
                action: "Start Strength Test",
            },
            SessionStep::CompleteRom => Instruction {
                title: format!("Step 4: Complete ROM{tag}"),
                text: "Strength test complete! Unlock the brace and return your arm to the \
                       starting position. Press 'Complete ROM' when finished."
                    .to_string(),
                action: "Complete ROM",
            },
            SessionStep::Finalize => Instruction {
                title: if mode.is_baseline() {
                    "Step 5: Finalize Baseline".to_string()
                } else {
                    "Step 5: Finalize Test".to_string()
                },
                text: format!("Press '{end_action}' to save your measurement results."),
                action: end_action,
            },
        }
    }
}

pub fn end_action_label(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Baseline => "Save Baseline",
        SessionMode::Regular => "End Test & View Results",
    }
}
