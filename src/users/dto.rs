use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Public profile summary returned to the client shell.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
}

/// Request body for a quiz score write.
#[derive(Debug, Deserialize)]
pub struct SaveProgressRequest {
    pub topic: String,
    pub score: f64,
}

/// Request body for marking an assignment complete.
#[derive(Debug, Deserialize)]
pub struct SaveAssignmentRequest {
    pub topic: String,
}

/// Both maps, as the client consumes them. Absent entries render as empty
/// objects, never null.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub quizzes: HashMap<String, f64>,
    pub assignments: HashMap<String, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_uses_camel_case() {
        let json = serde_json::to_string(&ProfileResponse {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            profile_picture: Some("profiles/x/1-a.png".into()),
        })
        .unwrap();
        assert!(json.contains("profilePicture"));
        assert!(!json.contains("profile_picture"));
    }

    #[test]
    fn empty_progress_is_not_null() {
        let json = serde_json::to_string(&ProgressResponse {
            quizzes: HashMap::new(),
            assignments: HashMap::new(),
        })
        .unwrap();
        assert_eq!(json, r#"{"quizzes":{},"assignments":{}}"#);
    }

    #[test]
    fn save_progress_request_deserializes() {
        let req: SaveProgressRequest =
            serde_json::from_str(r#"{"topic":"algebra","score":90}"#).unwrap();
        assert_eq!(req.topic, "algebra");
        assert_eq!(req.score, 90.0);
    }
}
