// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{at, day, plant_snapshot, DeviceFixture};

use meditrack::{
    config::Config,
    merge::resolve::{ReasonCode, Side},
    record::SessionKind,
    remote::RemoteError,
    BackupError,
};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use serde_json::json;

#[sealed_test]
fn merge_backup_between_two_devices() -> anyhow::Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async {
        let laptop = DeviceFixture::new("laptop", "drive").await?;
        laptop.complete("2024-01-01", SessionKind::Morning, 10, 1000).await?;
        laptop.complete("2024-01-02", SessionKind::Evening, 20, 2000).await?;
        laptop.service().authenticate().await?;
        let backup = laptop.service().upload_backup(at("2024-01-02T21:00:00Z")?).await?;

        let phone = DeviceFixture::new("phone", "drive").await?;
        phone.complete("2024-01-01", SessionKind::Morning, 25, 5000).await?;
        phone.complete("2024-01-03", SessionKind::Morning, 15, 6000).await?;
        phone.service().authenticate().await?;

        let listed = phone.service().list_backups().await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, backup.id);

        let preview = phone.service().preview_backup(&backup.id).await?;
        assert_eq!(preview.backup_date, "1/2/2024");
        assert_eq!(preview.sessions.new_sessions, 1);
        assert_eq!(preview.sessions.conflicts_resolved, 1);
        assert_eq!(preview.sessions.total_after_merge, 3);
        assert_eq!(
            preview.summary,
            "1 new session will be added, 1 conflict will be resolved"
        );

        let outcome = phone
            .service()
            .merge_backup(&backup.id, at("2024-01-03T12:00:00Z")?)
            .await?;
        assert_eq!(outcome.summary.new_sessions, preview.sessions.new_sessions);
        assert_eq!(outcome.summary.conflicts[0].winner_side, Side::Local);
        assert_eq!(outcome.summary.conflicts[0].reason, ReasonCode::MoreRecentCompletion);
        assert_eq!(outcome.safety_backup.data.sessions.len(), 2);

        let state = phone.state().await?;
        let slots: Vec<String> = state.sessions.iter().map(|s| s.key().to_string()).collect();
        assert_eq!(
            slots,
            vec!["2024-01-01 morning", "2024-01-02 evening", "2024-01-03 morning"]
        );
        assert_eq!(state.sessions[0].duration, 25);
        assert_eq!(state.progress.current_streak, 3);
        assert_eq!(state.progress.longest_streak, 3);
        assert_eq!(state.progress.total_sessions, 3);
        assert_eq!(state.progress.morning_streak, 1);
        assert_eq!(state.progress.last_session_date, Some(day("2024-01-03")?));

        // Merging the same backup again keeps everything as it is.
        let again = phone
            .service()
            .merge_backup(&backup.id, at("2024-01-03T12:00:00Z")?)
            .await?;
        assert_eq!(again.summary.new_sessions, 0);
        assert_eq!(phone.state().await?, state);

        Ok::<_, anyhow::Error>(())
    })
}

#[sealed_test]
fn merge_backup_rejects_foreign_snapshot_untouched() -> anyhow::Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async {
        let device = DeviceFixture::new("data", "drive").await?;
        device.complete("2024-01-01", SessionKind::Evening, 10, 1000).await?;
        device.service().authenticate().await?;
        plant_snapshot(
            "drive",
            "meditation-backup-foreign",
            &json!({
                "version": "1.0",
                "timestamp": "2024-01-15T08:30:00.000Z",
                "app": "habit-tracker",
                "data": { "sessions": [], "progress": {}, "settings": {} }
            }),
        )?;

        let before = std::fs::read("data/meditation_sessions.json")?;
        let result = device
            .service()
            .merge_backup("meditation-backup-foreign", at("2024-01-16T00:00:00Z")?)
            .await;
        assert!(matches!(result, Err(BackupError::InvalidBackupFormat(_))));
        assert_eq!(std::fs::read("data/meditation_sessions.json")?, before);

        let result = device.service().merge_backup("meditation-backup-missing", at("2024-01-16T00:00:00Z")?).await;
        assert!(matches!(
            result,
            Err(BackupError::RemoteIo(RemoteError::NotFound(_)))
        ));

        Ok::<_, anyhow::Error>(())
    })
}

#[sealed_test]
fn preview_backup_json_layout() -> anyhow::Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async {
        let device = DeviceFixture::new("data", "drive").await?;
        device.service().authenticate().await?;
        plant_snapshot(
            "drive",
            "meditation-backup-handmade",
            &json!({
                "version": "1.0",
                "timestamp": "2024-01-15T08:30:00.000Z",
                "app": "meditation-tracker",
                "data": {
                    "sessions": [
                        { "id": "x", "date": "2024-01-14", "type": "morning", "completed": true, "completedAt": 10, "duration": 12 }
                    ],
                    "progress": { "currentStreak": 40 },
                    "settings": { "language": "hindi", "theme": null, "morningReminderTime": "06:00" }
                }
            }),
        )?;

        let preview = device.service().preview_backup("meditation-backup-handmade").await?;
        let result = serde_json::to_value(&preview)?;
        assert_eq!(result["backupDate"], json!("1/15/2024"));
        assert_eq!(result["backupVersion"], json!("1.0"));
        assert_eq!(result["sessions"]["newSessions"], json!(1));
        assert_eq!(result["sessions"]["totalAfterMerge"], json!(1));
        assert_eq!(result["settings"]["changed"], json!(true));
        assert_eq!(
            result["settings"]["changes"],
            json!([{
                "key": "language",
                "action": "added",
                "value": "hindi",
                "reason": "missing_in_local"
            }])
        );
        assert_eq!(
            result["summary"],
            json!("1 new session will be added, 1 setting will be updated")
        );

        // Previewing never touches local data.
        assert!(!std::path::Path::new("data/meditation_sessions.json").exists());

        Ok::<_, anyhow::Error>(())
    })
}

#[sealed_test]
fn delete_backup_removes_snapshot() -> anyhow::Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async {
        let device = DeviceFixture::new("data", "drive").await?;
        device.service().authenticate().await?;
        let backup = device.service().upload_backup(at("2024-01-02T21:00:00Z")?).await?;

        device.service().delete_backup(&backup.id).await?;
        assert!(device.service().list_backups().await?.is_empty());

        device.service().sign_out().await?;
        assert!(matches!(
            device.service().list_backups().await,
            Err(BackupError::AuthenticationRequired)
        ));

        Ok::<_, anyhow::Error>(())
    })
}

#[sealed_test(env = [("MEDITRACK_ROOT", "sandbox")])]
fn device_from_config_file() -> anyhow::Result<()> {
    let config: Config = r#"
        [storage]
        data_dir = "$MEDITRACK_ROOT/data"

        [remote]
        backup_dir = "$MEDITRACK_ROOT/drive"
    "#
    .parse()?;

    tokio::runtime::Runtime::new()?.block_on(async {
        let device = DeviceFixture::new(&config.storage.data_dir, &config.remote.backup_dir).await?;
        device.complete("2024-01-01", SessionKind::Morning, 10, 1000).await?;
        device.service().authenticate().await?;
        device.service().upload_backup(at("2024-01-01T08:00:00Z")?).await?;

        assert!(std::path::Path::new("sandbox/data/meditation_sessions.json").exists());
        assert!(std::path::Path::new("sandbox/data/remote-session").exists());
        assert_eq!(std::fs::read_dir("sandbox/drive")?.count(), 1);

        Ok::<_, anyhow::Error>(())
    })
}
