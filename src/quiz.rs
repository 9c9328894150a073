/*!
Quiz questions for the games page.
*/
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum QuestionKind {
    #[serde(rename = "multiple-choice")]
    MultipleChoice,
    #[serde(rename = "fill-in-the-blank")]
    FillInTheBlank,
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::FillInTheBlank => "fill-in-the-blank",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple-choice"   => Ok(QuestionKind::MultipleChoice),
            "fill-in-the-blank" => Ok(QuestionKind::FillInTheBlank),
            _ => Err(format!("{:?} is not a valid question type.", s)),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Question {
    pub id: i64,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Ordered choices; empty for fill-in-the-blank questions.
    pub options: Vec<String>,
    pub answer: String,
}

/// Turn the admin form's option field into the stored option list.
///
/// Multiple-choice options arrive as one comma-separated string;
/// fill-in-the-blank questions carry no options at all.
pub fn parse_options(kind: QuestionKind, raw: &str) -> Vec<String> {
    match kind {
        QuestionKind::MultipleChoice => raw
            .split(',')
            .map(|o| o.trim().to_owned())
            .filter(|o| !o.is_empty())
            .collect(),
        QuestionKind::FillInTheBlank => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for kind in [QuestionKind::MultipleChoice, QuestionKind::FillInTheBlank] {
            let parsed: QuestionKind = kind.to_string().parse().unwrap();
            assert_eq!(kind, parsed);
        }
        assert!("essay".parse::<QuestionKind>().is_err());
    }

    #[test]
    fn options_split_and_trimmed() {
        assert_eq!(
            parse_options(QuestionKind::MultipleChoice, "jar, bowl ,  lid,"),
            vec!["jar", "bowl", "lid"]
        );
        assert!(parse_options(QuestionKind::FillInTheBlank, "ignored, too").is_empty());
    }
}
