//! Resolve a server name or ID to a single server.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{ComputeApi, Endpoint};
use crate::error::ScheduleError;

/// A server the schedule belongs to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerRef {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl ServerRef {
    pub fn schedule_endpoint(&self) -> Endpoint {
        Endpoint::new(&["servers", self.id.as_str(), "backup_schedule"])
    }
}

/// Older API versions return numeric IDs
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid server id: {}", other))),
    }
}

/// Look `reference` up as an ID first, then as an exact name.
pub fn find_server(api: &dyn ComputeApi, reference: &str) -> Result<ServerRef, ScheduleError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ScheduleError::Resolution("server name or ID must not be empty".into()));
    }

    match api.get(&Endpoint::new(&["servers", reference])) {
        Ok(body) => return decode_server(&body),
        Err(ScheduleError::NotFound(_)) => {
            tracing::debug!("no server with ID '{}', trying by name", reference);
        }
        Err(e) => return Err(e),
    }

    let body = api.get(&Endpoint::new(&["servers"]).with_query("name", reference))?;
    let servers = decode_list(&body)?;

    // The API treats `name` as a regex, so keep only exact matches
    let mut matches: Vec<ServerRef> = servers
        .into_iter()
        .filter(|server| server.name == reference)
        .collect();

    match matches.len() {
        0 => Err(ScheduleError::Resolution(format!(
            "No server with a name or ID of '{}' exists.",
            reference
        ))),
        1 => Ok(matches.remove(0)),
        _ => Err(ScheduleError::Resolution(format!(
            "Multiple servers match '{}', use an ID to be more specific.",
            reference
        ))),
    }
}

fn decode_server(body: &Value) -> Result<ServerRef, ScheduleError> {
    let server = body
        .get("server")
        .ok_or_else(|| ScheduleError::Decode("missing `server` object".into()))?;
    ServerRef::deserialize(server)
        .map_err(|e| ScheduleError::Decode(format!("invalid server: {}", e)))
}

fn decode_list(body: &Value) -> Result<Vec<ServerRef>, ScheduleError> {
    let servers = body
        .get("servers")
        .ok_or_else(|| ScheduleError::Decode("missing `servers` list".into()))?;
    Vec::<ServerRef>::deserialize(servers)
        .map_err(|e| ScheduleError::Decode(format!("invalid server list: {}", e)))
}
