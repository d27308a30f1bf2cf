use serde_json::{Value, json};
use tracing::{error, instrument};

use crate::session::{ApiError, Session};
use crate::transport::Form;

const GROUP_CREATE_DOC_ID: &str = "577041672419534";
const OPERATION: &str = "createNewGroup";

impl Session {
    /// Creates a group thread with `participant_ids` plus this account and
    /// returns the new thread id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for fewer than two participants,
    /// before any exchange. Returns [`ApiError::Rejected`] when the payload
    /// carries `errors` and [`ApiError::MalformedResponse`] when it lacks the
    /// thread id.
    #[instrument(level = "debug", skip(self, participant_ids), fields(participants = participant_ids.len()))]
    pub async fn create_new_group(
        &self,
        participant_ids: &[String],
        title: Option<&str>,
    ) -> Result<String, ApiError> {
        if participant_ids.len() < 2 {
            return Err(ApiError::validation(
                OPERATION,
                "participant ids should have at least 2 entries",
            ));
        }

        let variables = group_create_variables(self.identity(), participant_ids, title);
        let mut form = Form::new();
        form.set("fb_api_caller_class", "RelayModern")
            .set("fb_api_req_friendly_name", "MessengerGroupCreateMutation")
            .set("av", self.identity())
            .set("doc_id", GROUP_CREATE_DOC_ID)
            .set("variables", variables.to_string());

        let url = self.urls().url("/api/graphql/");
        let result = self
            .post(&url, &form)
            .await
            .and_then(|payload| new_thread_id(&url, &payload));
        if let Err(e) = &result {
            error!(error = %e, "createNewGroup failed");
        }
        result
    }
}

fn group_create_variables(identity: &str, participant_ids: &[String], title: Option<&str>) -> Value {
    let mut participants: Vec<Value> = participant_ids
        .iter()
        .map(|id| json!({ "fbid": id }))
        .collect();
    participants.push(json!({ "fbid": identity }));
    json!({
        "input": {
            "entry_point": "jewel_new_group",
            "actor_id": identity,
            "participants": participants,
            "client_mutation_id": "0",
            "thread_settings": {
                "name": title,
                "joinable_mode": "PRIVATE",
                "thread_image_fbid": null
            }
        }
    })
}

fn new_thread_id(url: &str, payload: &Value) -> Result<String, ApiError> {
    if let Some(errors) = payload.get("errors").filter(|errors| !errors.is_null()) {
        return Err(ApiError::rejected(OPERATION, errors.to_string()));
    }
    let thread_id = payload.pointer("/data/messenger_group_thread_create/thread/thread_key/thread_fbid");
    match thread_id {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(ApiError::MalformedResponse {
            url: url.to_string(),
            status: 200,
            reason: "response has no thread id".to_string(),
        }),
    }
}
