use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{pause, Pacing};
use crate::error::RelayError;
use crate::event::{EventKind, StreamEvent};
use crate::source::EventStream;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatParams {
    pub user_question: String,
    #[serde(default)]
    pub property_details: Map<String, Value>,
    #[serde(default)]
    pub chat_history: Vec<Value>,
}

pub fn chat_answer(question: &str) -> String {
    format!(
        "Based on the property details you've shared, {}. \
         This property features excellent amenities and is located in a prime area. \
         The neighborhood offers great schools, shopping centers, and easy access to public transportation. \
         The property has been well-maintained and represents excellent value for the price. \
         Would you like to know more about any specific aspect of this property?",
        question.to_lowercase()
    )
}

/// Word-by-word `token` events followed by `done`
pub fn chat_stream(params: ChatParams, pacing: Pacing) -> EventStream {
    Box::pin(async_stream::stream! {
        let answer = chat_answer(&params.user_question);
        let mut seq = 0u64;

        for (index, word) in answer.split_whitespace().enumerate() {
            pause(pacing.token_delay).await;
            yield Ok::<_, RelayError>(StreamEvent::new(EventKind::Token, seq, json!({
                "content": format!("{} ", word),
                "index": index,
            })));
            seq += 1;
        }

        info!("Chat response complete");
        yield Ok::<_, RelayError>(StreamEvent::new(EventKind::Done, seq, json!({ "message": "Response complete" })));
    })
}
