use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{pause, Pacing};
use crate::error::RelayError;
use crate::event::{EventKind, StreamEvent};
use crate::source::EventStream;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub question: String,
}

const KEYWORD_STAGES: &[(&[&str], &[&str])] = &[
    (
        &["near", "close", "distance", "location"],
        &[
            "Identifying location requirements...",
            "Searching properties by location...",
            "Calculating distances to amenities...",
        ],
    ),
    (
        &["price", "cost", "budget", "affordable", "cheap", "expensive"],
        &["Filtering by price range...", "Analyzing property values..."],
    ),
    (
        &["bedroom", "bathroom", "room", "size", "square"],
        &["Matching property specifications...", "Filtering by size requirements..."],
    ),
    (
        &["school", "education", "university", "college"],
        &["Finding nearby schools...", "Gathering school ratings..."],
    ),
    (
        &["park", "mall", "shopping", "restaurant", "amenity"],
        &["Searching nearby amenities...", "Enriching with landmark data..."],
    ),
];

const DEFAULT_STAGES: &[&str] = &[
    "Searching property database...",
    "Filtering results by criteria...",
    "Ranking properties by relevance...",
    "Enriching with additional data...",
];

/// Processing stages announced for a query, chosen from its keywords
pub fn search_stages(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut stages = vec![format!("Analyzing your search: '{}'", query)];

    for (keywords, group) in KEYWORD_STAGES {
        if keywords.iter().any(|k| lowered.contains(k)) {
            stages.extend(group.iter().map(|s| s.to_string()));
        }
    }

    if stages.len() == 1 {
        stages.extend(DEFAULT_STAGES.iter().map(|s| s.to_string()));
    }
    stages
}

/// Stream of typed-out progress stages followed by a `result` event
pub fn search_stream(params: SearchParams, pacing: Pacing) -> EventStream {
    Box::pin(async_stream::stream! {
        let stages = search_stages(&params.question);
        let total = stages.len();
        let mut seq = 0u64;

        for (i, stage) in stages.iter().enumerate() {
            let mut typed = String::new();
            for ch in stage.chars() {
                typed.push(ch);
                yield Ok::<_, RelayError>(StreamEvent::new(EventKind::ProgressChar, seq, json!({
                    "char": ch.to_string(),
                    "message": typed,
                    "is_complete": false,
                    "replace": true,
                })));
                seq += 1;
                pause(pacing.char_delay).await;
            }

            yield Ok::<_, RelayError>(StreamEvent::new(EventKind::Progress, seq, json!({
                "message": typed,
                "is_complete": true,
                "replace": true,
                "percent": (i + 1) * 100 / total,
            })));
            seq += 1;
            debug!("Sent progress {}/{}: {}", i + 1, total, stage);

            let typing = pacing.char_delay * stage.chars().count() as u32;
            pause(pacing.stage_duration.saturating_sub(typing)).await;
        }

        let result = sample_result();
        info!(
            "Sending final results: {} properties",
            result["properties"].as_array().map(Vec::len).unwrap_or(0)
        );
        yield Ok::<_, RelayError>(StreamEvent::new(EventKind::Result, seq, result));
    })
}

/// Fixed listing returned by every search
pub fn sample_result() -> Value {
    json!({
        "properties": [
            {
                "id": "1",
                "address": "123 Main Street, San Francisco, CA 94102",
                "price": 850000,
                "bedrooms": 3,
                "bathrooms": 2,
                "square_feet": 1850,
                "year_built": 2015,
                "property_type": "Condo",
                "schools": [
                    { "name": "Lincoln High School", "rating": 8.5, "distance": "0.3 miles", "grade": "9-12" },
                    { "name": "Roosevelt Elementary", "rating": 9.2, "distance": "0.5 miles", "grade": "K-5" },
                    { "name": "Washington Middle School", "rating": 8.8, "distance": "0.7 miles", "grade": "6-8" }
                ]
            },
            {
                "id": "2",
                "address": "456 Oak Avenue, San Francisco, CA 94103",
                "price": 1200000,
                "bedrooms": 4,
                "bathrooms": 3,
                "square_feet": 2400,
                "year_built": 2018,
                "property_type": "Townhouse",
                "schools": [
                    { "name": "Jefferson High School", "rating": 9.1, "distance": "0.4 miles", "grade": "9-12" },
                    { "name": "Madison Elementary", "rating": 9.5, "distance": "0.3 miles", "grade": "K-5" },
                    { "name": "Adams Middle School", "rating": 9.0, "distance": "0.6 miles", "grade": "6-8" },
                    { "name": "Stanford University", "rating": 9.8, "distance": "2.5 miles", "grade": "University" }
                ]
            },
            {
                "id": "3",
                "address": "789 Pine Road, San Francisco, CA 94104",
                "price": 650000,
                "bedrooms": 2,
                "bathrooms": 1,
                "square_feet": 1200,
                "year_built": 2010,
                "property_type": "Apartment",
                "schools": [
                    { "name": "Hamilton High School", "rating": 8.2, "distance": "0.8 miles", "grade": "9-12" },
                    { "name": "Franklin Elementary", "rating": 8.7, "distance": "1.0 miles", "grade": "K-5" }
                ]
            },
            {
                "id": "4",
                "address": "321 Elm Street, San Francisco, CA 94105",
                "price": 950000,
                "bedrooms": 3,
                "bathrooms": 2.5,
                "square_feet": 2100,
                "year_built": 2019,
                "property_type": "Single Family",
                "schools": [
                    { "name": "Monroe High School", "rating": 9.3, "distance": "0.2 miles", "grade": "9-12" },
                    { "name": "Jackson Elementary", "rating": 9.4, "distance": "0.4 miles", "grade": "K-5" },
                    { "name": "Van Buren Middle School", "rating": 9.1, "distance": "0.5 miles", "grade": "6-8" },
                    { "name": "UC Berkeley Extension", "rating": 9.6, "distance": "3.0 miles", "grade": "University" }
                ]
            },
            {
                "id": "5",
                "address": "654 Maple Drive, San Francisco, CA 94106",
                "price": 750000,
                "bedrooms": 2,
                "bathrooms": 2,
                "square_feet": 1500,
                "year_built": 2016,
                "property_type": "Condo",
                "schools": [
                    { "name": "Harrison High School", "rating": 8.9, "distance": "0.6 miles", "grade": "9-12" },
                    { "name": "Tyler Elementary", "rating": 8.5, "distance": "0.7 miles", "grade": "K-5" }
                ]
            },
            {
                "id": "6",
                "address": "987 Cedar Lane, San Francisco, CA 94107",
                "price": 1100000,
                "bedrooms": 5,
                "bathrooms": 4,
                "square_feet": 3200,
                "year_built": 2020,
                "property_type": "Single Family",
                "schools": [
                    { "name": "Polk High School", "rating": 9.5, "distance": "0.3 miles", "grade": "9-12" },
                    { "name": "Taylor Elementary", "rating": 9.7, "distance": "0.2 miles", "grade": "K-5" },
                    { "name": "Fillmore Middle School", "rating": 9.4, "distance": "0.4 miles", "grade": "6-8" },
                    { "name": "San Francisco State University", "rating": 9.2, "distance": "4.2 miles", "grade": "University" }
                ]
            }
        ],
        "landmarks": [
            { "name": "Golden Gate Park", "distance": "1.2 miles", "type": "Park" },
            { "name": "Union Square", "distance": "0.8 miles", "type": "Shopping" },
            { "name": "Fisherman's Wharf", "distance": "2.1 miles", "type": "Attraction" },
            { "name": "Chinatown", "distance": "1.5 miles", "type": "Neighborhood" }
        ]
    })
}
