//! Combined feed of backend alerts and AI-derived items.

use crate::model::{AlertLevel, AlertRecord, InsightRecord};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    System,
    Ai,
}

/// Alert levels plus the AI-only `PREDICTION` tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedLevel {
    Critical,
    Warning,
    Info,
    Prediction,
}

impl From<AlertLevel> for FeedLevel {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Critical => FeedLevel::Critical,
            AlertLevel::Warning => FeedLevel::Warning,
            AlertLevel::Info => FeedLevel::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub level: FeedLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub source: FeedSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFilter {
    All,
    Ai,
    System,
    Level(FeedLevel),
}

impl FeedFilter {
    pub fn matches(&self, item: &FeedItem) -> bool {
        match self {
            FeedFilter::All => true,
            FeedFilter::Ai => item.source == FeedSource::Ai,
            FeedFilter::System => item.source == FeedSource::System,
            FeedFilter::Level(level) => item.level == *level,
        }
    }
}

impl FromStr for FeedFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" | "" => Ok(FeedFilter::All),
            "AI" => Ok(FeedFilter::Ai),
            "SYSTEM" => Ok(FeedFilter::System),
            "CRITICAL" => Ok(FeedFilter::Level(FeedLevel::Critical)),
            "WARNING" => Ok(FeedFilter::Level(FeedLevel::Warning)),
            "INFO" => Ok(FeedFilter::Level(FeedLevel::Info)),
            "PREDICTION" => Ok(FeedFilter::Level(FeedLevel::Prediction)),
            other => Err(format!("unknown feed filter: {}", other)),
        }
    }
}

/// Build the merged feed: system alerts first, then AI predictions,
/// recommendations and bottlenecks from the latest insight.
pub fn build_feed(alerts: &[AlertRecord], insight: Option<&InsightRecord>) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = alerts
        .iter()
        .enumerate()
        .map(|(i, a)| FeedItem {
            id: format!("system-{}", i),
            item_type: a.alert_type.clone(),
            level: a.level.into(),
            message: a.message.clone(),
            timestamp: a.timestamp,
            source: FeedSource::System,
        })
        .collect();

    let Some(insight) = insight.filter(|r| r.enabled) else {
        return items;
    };

    let groups: [(&str, &str, FeedLevel, &Vec<String>); 3] = [
        ("ai-pred", "AI_PREDICTION", FeedLevel::Prediction, &insight.predictions),
        ("ai-rec", "AI_RECOMMENDATION", FeedLevel::Info, &insight.recommendations),
        ("ai-bottleneck", "AI_BOTTLENECK", FeedLevel::Warning, &insight.bottlenecks),
    ];
    for (prefix, item_type, level, messages) in groups {
        items.extend(messages.iter().enumerate().map(|(i, m)| FeedItem {
            id: format!("{}-{}", prefix, i),
            item_type: item_type.to_string(),
            level,
            message: m.clone(),
            timestamp: insight.timestamp,
            source: FeedSource::Ai,
        }));
    }

    items
}

pub fn filter_feed(items: &[FeedItem], filter: FeedFilter) -> Vec<FeedItem> {
    items.iter().filter(|i| filter.matches(i)).cloned().collect()
}
