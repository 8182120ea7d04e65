use std::str::FromStr;

use apg_common::Money;
use log::warn;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Setting, Settings},
    traits::SettingsApiError,
};

pub const BONUS_THRESHOLD: &str = "bonus_threshold";
pub const BONUS_AMOUNT: &str = "bonus_amount";
pub const DISCOUNT_RATE_BPS: &str = "discount_rate_bps";
pub const CONVERSION_RATE_BPS: &str = "conversion_rate_bps";
pub const MIN_FLOAT: &str = "min_float";

const KNOWN_SETTINGS: [&str; 5] =
    [BONUS_THRESHOLD, BONUS_AMOUNT, DISCOUNT_RATE_BPS, CONVERSION_RATE_BPS, MIN_FLOAT];

pub async fn fetch_all(conn: &mut SqliteConnection) -> Result<Vec<Setting>, SettingsApiError> {
    let settings = sqlx::query_as("SELECT * FROM settings ORDER BY name ASC").fetch_all(conn).await?;
    Ok(settings)
}

/// Builds the typed snapshot from the raw rows. A missing or unparseable row falls back to the default for that
/// setting, with a warning, rather than poisoning every resolution.
pub async fn fetch_snapshot(conn: &mut SqliteConnection) -> Result<Settings, SettingsApiError> {
    let rows = fetch_all(conn).await?;
    let mut settings = Settings::default();
    for row in rows {
        match row.name.as_str() {
            BONUS_THRESHOLD => apply_money(&mut settings.bonus_threshold, &row),
            BONUS_AMOUNT => apply_money(&mut settings.bonus_amount, &row),
            DISCOUNT_RATE_BPS => apply_bps(&mut settings.discount_rate_bps, &row),
            CONVERSION_RATE_BPS => apply_bps(&mut settings.conversion_rate_bps, &row),
            MIN_FLOAT => apply_money(&mut settings.min_float, &row),
            other => warn!("🪛️ Ignoring unknown setting {other}"),
        }
    }
    Ok(settings)
}

fn apply_money(target: &mut Money, row: &Setting) {
    match Money::from_str(&row.value) {
        Ok(value) => *target = value,
        Err(e) => warn!("🪛️ Setting {} has an invalid value ({}). Using the default. {e}", row.name, row.value),
    }
}

fn apply_bps(target: &mut i64, row: &Setting) {
    match parse_bps(&row.value) {
        Ok(value) => *target = value,
        Err(reason) => {
            warn!("🪛️ Setting {} has an invalid value ({}). Using the default. {reason}", row.name, row.value)
        },
    }
}

fn parse_bps(value: &str) -> Result<i64, String> {
    let bps = value.trim().parse::<i64>().map_err(|e| e.to_string())?;
    if !(0..=10_000).contains(&bps) {
        return Err(format!("{bps} is outside the range 0..=10000"));
    }
    Ok(bps)
}

/// Upserts a single named setting after validating the name and value.
pub async fn update(name: &str, value: &str, conn: &mut SqliteConnection) -> Result<Setting, SettingsApiError> {
    if !KNOWN_SETTINGS.contains(&name) {
        return Err(SettingsApiError::UnknownSetting(name.to_string()));
    }
    match name {
        DISCOUNT_RATE_BPS | CONVERSION_RATE_BPS => {
            parse_bps(value).map_err(|reason| SettingsApiError::InvalidValue { name: name.to_string(), reason })?;
        },
        _ => {
            let amount = Money::from_str(value)
                .map_err(|e| SettingsApiError::InvalidValue { name: name.to_string(), reason: e.to_string() })?;
            if amount.is_negative() {
                return Err(SettingsApiError::InvalidValue {
                    name: name.to_string(),
                    reason: "amounts cannot be negative".to_string(),
                });
            }
        },
    }
    let setting = sqlx::query_as(
        r#"INSERT INTO settings (name, value) VALUES ($1, $2)
           ON CONFLICT (name) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
           RETURNING *"#,
    )
    .bind(name)
    .bind(value)
    .fetch_one(conn)
    .await?;
    Ok(setting)
}
