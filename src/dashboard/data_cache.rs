use crate::dashboard::error::{DashboardError, DashboardResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub account_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default)]
    pub strategy_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Strategy {
    pub id: String,
    pub name: String,
}

/// Month key in `YYYY-MM` form.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Trades of one account grouped by calendar month, oldest month first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradesByMonth {
    months: BTreeMap<String, Vec<Trade>>,
}

impl TradesByMonth {
    pub fn build(trades: &[Trade], account_id: &str) -> Self {
        let mut months: BTreeMap<String, Vec<Trade>> = BTreeMap::new();
        for trade in trades.iter().filter(|t| t.account_id == account_id) {
            months
                .entry(month_key(trade.date))
                .or_default()
                .push(trade.clone());
        }
        for trades in months.values_mut() {
            trades.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        }
        Self { months }
    }

    pub fn month(&self, key: &str) -> &[Trade] {
        self.months.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn months(&self) -> impl Iterator<Item = &str> {
        self.months.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

/// Receiving half of the trade dataset signal. `None` means "not loaded yet".
pub type TradeFeed = watch::Receiver<Option<Arc<Vec<Trade>>>>;

/// Sending half paired with [`TradeFeed`].
pub type TradePublisher = watch::Sender<Option<Arc<Vec<Trade>>>>;

pub fn trade_channel() -> (TradePublisher, TradeFeed) {
    watch::channel(None)
}

/// Wait until the trade dataset has been published, or fail once `timeout`
/// expires.
pub async fn wait_for_trades(
    mut feed: TradeFeed,
    timeout: Duration,
) -> DashboardResult<Arc<Vec<Trade>>> {
    let waited = tokio::time::timeout(timeout, async {
        feed.wait_for(Option::is_some)
            .await
            .map(|trades| trades.clone())
    })
    .await;
    match waited {
        Ok(Ok(Some(trades))) => Ok(trades),
        Ok(Ok(None)) | Ok(Err(_)) => Err(DashboardError::Configuration(
            "trade data source closed before publishing trades".into(),
        )),
        Err(_) => Err(DashboardError::Configuration(format!(
            "trade data was not available after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Loaded inputs the widgets read from, shared by every render.
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub trades: Arc<Vec<Trade>>,
    pub strategies: Vec<Strategy>,
    pub accounts: Vec<Account>,
    pub active_account_id: String,
    pub trades_by_month: TradesByMonth,
}

impl DashboardData {
    pub fn new(
        trades: Arc<Vec<Trade>>,
        strategies: Vec<Strategy>,
        accounts: Vec<Account>,
        active_account_id: String,
    ) -> Self {
        let trades_by_month = TradesByMonth::build(&trades, &active_account_id);
        Self {
            trades,
            strategies,
            accounts,
            active_account_id,
            trades_by_month,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(id: &str, account: &str, date: (i32, u32, u32), pnl: f64) -> Trade {
        Trade {
            id: id.into(),
            account_id: account.into(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            symbol: "ES".into(),
            pnl,
            strategy_id: None,
        }
    }

    #[test]
    fn groups_active_account_trades_by_month() {
        let trades = vec![
            trade("3", "main", (2024, 2, 10), 50.0),
            trade("1", "main", (2024, 1, 15), 10.0),
            trade("2", "main", (2024, 1, 3), -5.0),
            trade("4", "other", (2024, 1, 4), 99.0),
        ];
        let index = TradesByMonth::build(&trades, "main");
        assert_eq!(index.months().collect::<Vec<_>>(), vec!["2024-01", "2024-02"]);
        let january: Vec<&str> = index.month("2024-01").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(january, vec!["2", "1"]);
        assert!(index.month("2023-12").is_empty());
    }

    #[tokio::test]
    async fn waits_for_published_trades() {
        let (tx, rx) = trade_channel();
        let publisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(Some(Arc::new(vec![trade("1", "main", (2024, 3, 1), 1.0)])))
                .unwrap();
            tx
        });
        let trades = wait_for_trades(rx, Duration::from_secs(2)).await.unwrap();
        assert_eq!(trades.len(), 1);
        drop(publisher.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_trades_never_arrive() {
        let (_tx, rx) = trade_channel();
        let err = wait_for_trades(rx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Configuration(_)));
    }
}
