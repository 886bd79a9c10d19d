//! Backup schedule resource and the manager that issues its requests.

use std::fmt;

use crate::api::ComputeApi;
use crate::error::ScheduleError;
use crate::schedule::{ScheduleOverrides, ScheduleSpec};
use crate::servers::ServerRef;

/// Issues schedule requests for any server
pub struct BackupScheduleManager<'a> {
    api: &'a dyn ComputeApi,
}

impl<'a> BackupScheduleManager<'a> {
    pub fn new(api: &'a dyn ComputeApi) -> Self {
        Self { api }
    }

    /// Get the current backup schedule for a server.
    pub fn get(&self, server: &ServerRef) -> Result<BackupSchedule<'_>, ScheduleError> {
        let body = self.api.get(&server.schedule_endpoint())?;
        let spec = ScheduleSpec::from_wire(&body)?;
        Ok(BackupSchedule {
            manager: self,
            server: server.clone(),
            spec,
        })
    }

    /// Create or replace the schedule. The API replaces the whole document,
    /// so `spec` must already hold every field the caller wants to keep.
    pub fn submit(&self, server: &ServerRef, spec: &ScheduleSpec) -> Result<(), ScheduleError> {
        tracing::info!(
            "submitting backup schedule for server {}: enabled={} weekly={} daily={} rotation={}",
            server.id,
            spec.enabled,
            spec.weekly,
            spec.daily,
            spec.rotation
        );
        self.api.post(&server.schedule_endpoint(), &spec.to_wire())
    }

    /// Remove the scheduled backup for `server`.
    pub fn delete(&self, server: &ServerRef) -> Result<(), ScheduleError> {
        tracing::info!("deleting backup schedule for server {}", server.id);
        self.api.delete(&server.schedule_endpoint())
    }

    /// Apply `overrides` to the server's current schedule, or to the
    /// defaults when it has none yet, and submit the result.
    pub fn update_or_create(
        &self,
        server: &ServerRef,
        overrides: &ScheduleOverrides,
    ) -> Result<BackupSchedule<'_>, ScheduleError> {
        match self.get(server) {
            Ok(mut schedule) => {
                schedule.update(overrides)?;
                Ok(schedule)
            }
            Err(ScheduleError::NotFound(_)) => {
                tracing::info!("server {} has no backup schedule, creating one", server.id);
                let spec = ScheduleSpec::default().merge(overrides);
                self.submit(server, &spec)?;
                Ok(BackupSchedule {
                    manager: self,
                    server: server.clone(),
                    spec,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// The backup schedule of one server, as last fetched
pub struct BackupSchedule<'a> {
    manager: &'a BackupScheduleManager<'a>,
    server: ServerRef,
    spec: ScheduleSpec,
}

impl fmt::Debug for BackupSchedule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupSchedule")
            .field("server", &self.server)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl<'a> BackupSchedule<'a> {
    pub fn server(&self) -> &ServerRef {
        &self.server
    }

    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }

    /// Fetch this schedule again from the API.
    pub fn refresh(&mut self) -> Result<(), ScheduleError> {
        let fresh = self.manager.get(&self.server)?;
        self.spec = fresh.spec;
        Ok(())
    }

    /// Merge `overrides` onto the fetched state and submit it. On success
    /// `spec()` holds the document that was sent.
    pub fn update(&mut self, overrides: &ScheduleOverrides) -> Result<(), ScheduleError> {
        let merged = self.spec.merge(overrides);
        self.manager.submit(&self.server, &merged)?;
        self.spec = merged;
        Ok(())
    }

    /// Disable and remove this schedule.
    pub fn delete(self) -> Result<(), ScheduleError> {
        self.manager.delete(&self.server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{DailyChoice, WeeklyChoice, WIRE_KEY};
    use crate::servers::tests::FakeCompute;
    use serde_json::{json, Value};

    const PATH: &str = "/servers/42/backup_schedule";

    fn server() -> ServerRef {
        ServerRef {
            id: "42".into(),
            name: "web01".into(),
        }
    }

    fn stored() -> Value {
        json!({
            "backupSchedule": {
                "enabled": true,
                "weekly": "SUNDAY",
                "daily": "DISABLED",
                "rotation": 2
            }
        })
    }

    #[test]
    fn test_get_carries_server() {
        let api = FakeCompute::default().with(PATH, stored());
        let manager = BackupScheduleManager::new(&api);

        let schedule = manager.get(&server()).unwrap();
        assert_eq!(schedule.server(), &server());
        assert_eq!(schedule.spec().weekly, WeeklyChoice::Sunday);
        assert_eq!(schedule.spec().rotation, 2);
    }

    #[test]
    fn test_get_missing_schedule_is_not_found() {
        let api = FakeCompute::default();
        let manager = BackupScheduleManager::new(&api);

        assert!(matches!(manager.get(&server()), Err(ScheduleError::NotFound(_))));
        assert_eq!(api.methods(), vec![format!("GET {}", PATH)]);
    }

    #[test]
    fn test_partial_update_preserves_other_fields() {
        let api = FakeCompute::default().with(PATH, stored());
        let manager = BackupScheduleManager::new(&api);

        let overrides = ScheduleOverrides {
            daily: Some(DailyChoice::Hours0200To0400),
            ..Default::default()
        };
        let mut schedule = manager.get(&server()).unwrap();
        schedule.update(&overrides).unwrap();

        assert_eq!(schedule.spec().daily, DailyChoice::Hours0200To0400);
        assert_eq!(schedule.spec().weekly, WeeklyChoice::Sunday);
        assert_eq!(api.methods(), vec![format!("GET {}", PATH), format!("POST {}", PATH)]);
        assert_eq!(
            api.last_body().unwrap(),
            json!({
                "backupSchedule": {
                    "enabled": true,
                    "weekly": "SUNDAY",
                    "daily": "H_0200_0400",
                    "rotation": 2
                }
            })
        );
    }

    #[test]
    fn test_noop_update_resubmits_fetched_document() {
        let api = FakeCompute::default().with(PATH, stored());
        let manager = BackupScheduleManager::new(&api);

        manager
            .update_or_create(&server(), &ScheduleOverrides::default())
            .unwrap();
        assert_eq!(api.last_body().unwrap(), stored());
    }

    #[test]
    fn test_update_without_schedule_starts_from_defaults() {
        let api = FakeCompute::default();
        let manager = BackupScheduleManager::new(&api);

        let overrides = ScheduleOverrides {
            weekly: Some(WeeklyChoice::Wednesday),
            ..Default::default()
        };
        let schedule = manager.update_or_create(&server(), &overrides).unwrap();

        assert_eq!(schedule.server(), &server());
        assert_eq!(
            schedule.spec(),
            &ScheduleSpec {
                weekly: WeeklyChoice::Wednesday,
                ..ScheduleSpec::default()
            }
        );
        assert_eq!(api.last_body().unwrap()[WIRE_KEY]["weekly"], "WEDNESDAY");
    }

    #[test]
    fn test_submit_failure_propagates() {
        let api = FakeCompute {
            fail_writes: Some(503),
            ..FakeCompute::default()
        }
        .with(PATH, stored());
        let manager = BackupScheduleManager::new(&api);

        let err = manager
            .update_or_create(&server(), &ScheduleOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Transport { status: Some(503), .. }));
    }

    #[test]
    fn test_refresh_refetches() {
        let api = FakeCompute::default().with(PATH, stored());
        let manager = BackupScheduleManager::new(&api);

        let mut schedule = manager.get(&server()).unwrap();
        schedule.refresh().unwrap();
        assert_eq!(schedule.spec().weekly, WeeklyChoice::Sunday);
        assert_eq!(api.methods(), vec![format!("GET {}", PATH), format!("GET {}", PATH)]);
    }

    #[test]
    fn test_update_then_refresh_reads_stored_document() {
        let api = FakeCompute::default().with(PATH, stored());
        let manager = BackupScheduleManager::new(&api);

        let overrides = ScheduleOverrides {
            rotation: Some(7),
            ..Default::default()
        };
        let mut schedule = manager.update_or_create(&server(), &overrides).unwrap();
        assert_eq!(schedule.spec().rotation, 7);

        // The fake keeps serving the original document, so a refresh shows
        // what the API holds rather than what was sent.
        schedule.refresh().unwrap();
        assert_eq!(schedule.spec().rotation, 2);
        assert_eq!(
            api.methods(),
            vec![
                format!("GET {}", PATH),
                format!("POST {}", PATH),
                format!("GET {}", PATH)
            ]
        );
    }

    #[test]
    fn test_debug_omits_manager() {
        let api = FakeCompute::default().with(PATH, stored());
        let manager = BackupScheduleManager::new(&api);

        let rendered = format!("{:?}", manager.get(&server()).unwrap());
        assert!(rendered.starts_with("BackupSchedule { server: ServerRef"));
        assert!(rendered.ends_with(".. }"));
    }

    #[test]
    fn test_delete() {
        let api = FakeCompute::default().with(PATH, stored());
        let manager = BackupScheduleManager::new(&api);

        manager.get(&server()).unwrap().delete().unwrap();
        assert_eq!(api.methods(), vec![format!("GET {}", PATH), format!("DELETE {}", PATH)]);
    }

    #[test]
    fn test_delete_without_schedule_is_not_found() {
        let api = FakeCompute::default();
        let manager = BackupScheduleManager::new(&api);

        let err = manager.delete(&server()).unwrap_err();
        assert!(err.is_not_found());
    }
}
