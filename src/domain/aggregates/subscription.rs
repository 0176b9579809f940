//! Premium Subscription Aggregate

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionPlan { Monthly, Yearly }

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Monthly => "MONTHLY", Self::Yearly => "YEARLY" }
    }

    fn term(&self) -> Months {
        match self { Self::Monthly => Months::new(1), Self::Yearly => Months::new(12) }
    }
}

impl fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SubscriptionPlan {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            other => Err(format!("unknown subscription plan {other:?}")),
        }
    }
}

/// At most one row per user; resubscribing reactivates the existing row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_type: SubscriptionPlan,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
    pub auto_renew: bool,
}

impl PremiumSubscription {
    pub fn start(user_id: Uuid, plan_type: SubscriptionPlan, today: NaiveDate) -> Self {
        let mut subscription = Self { id: Uuid::now_v7(), user_id, plan_type, start_date: today, end_date: today, active: false, auto_renew: false };
        subscription.activate(plan_type, today);
        subscription
    }

    /// Starts a new term from `today`, keeping the row id.
    pub fn activate(&mut self, plan_type: SubscriptionPlan, today: NaiveDate) {
        self.plan_type = plan_type;
        self.start_date = today;
        self.end_date = today.checked_add_months(plan_type.term()).unwrap_or(NaiveDate::MAX);
        self.active = true;
        self.auto_renew = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.auto_renew = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_terms() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let monthly = PremiumSubscription::start(Uuid::now_v7(), SubscriptionPlan::Monthly, today);
        assert_eq!(monthly.end_date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(monthly.active && monthly.auto_renew);
        let yearly = PremiumSubscription::start(Uuid::now_v7(), SubscriptionPlan::Yearly, today);
        assert_eq!(yearly.end_date, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
    }

    #[test]
    fn test_reactivation_keeps_row() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut sub = PremiumSubscription::start(Uuid::now_v7(), SubscriptionPlan::Monthly, today);
        let id = sub.id;
        sub.deactivate();
        assert!(!sub.active && !sub.auto_renew);
        let later = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        sub.activate(SubscriptionPlan::Yearly, later);
        assert_eq!(sub.id, id);
        assert_eq!(sub.start_date, later);
        assert_eq!(sub.end_date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }

    #[test]
    fn test_plan_parse() {
        assert_eq!("YEARLY".parse::<SubscriptionPlan>().unwrap(), SubscriptionPlan::Yearly);
        assert!("WEEKLY".parse::<SubscriptionPlan>().is_err());
    }
}
