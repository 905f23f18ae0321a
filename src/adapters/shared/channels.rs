//! Per-kind market data queues
//!
//! Order book data sources push parsed messages into unbounded queues, one
//! per message kind, and the consumer drains whichever it needs.

use tokio::sync::mpsc;

use crate::adapters::types::{FundingInfoUpdate, OrderBookMessage};

/// Sending side handed to a data source
#[derive(Debug, Clone)]
pub struct MarketDataQueues {
    pub snapshots: mpsc::UnboundedSender<OrderBookMessage>,
    pub diffs: mpsc::UnboundedSender<OrderBookMessage>,
    pub trades: mpsc::UnboundedSender<OrderBookMessage>,
    pub funding: mpsc::UnboundedSender<FundingInfoUpdate>,
}

/// Receiving side kept by the consumer
#[derive(Debug)]
pub struct MarketDataReceivers {
    pub snapshots: mpsc::UnboundedReceiver<OrderBookMessage>,
    pub diffs: mpsc::UnboundedReceiver<OrderBookMessage>,
    pub trades: mpsc::UnboundedReceiver<OrderBookMessage>,
    pub funding: mpsc::UnboundedReceiver<FundingInfoUpdate>,
}

pub fn market_data_channels() -> (MarketDataQueues, MarketDataReceivers) {
    let (snap_tx, snap_rx) = mpsc::unbounded_channel();
    let (diff_tx, diff_rx) = mpsc::unbounded_channel();
    let (trade_tx, trade_rx) = mpsc::unbounded_channel();
    let (funding_tx, funding_rx) = mpsc::unbounded_channel();
    (
        MarketDataQueues {
            snapshots: snap_tx,
            diffs: diff_tx,
            trades: trade_tx,
            funding: funding_tx,
        },
        MarketDataReceivers {
            snapshots: snap_rx,
            diffs: diff_rx,
            trades: trade_rx,
            funding: funding_rx,
        },
    )
}

impl MarketDataQueues {
    /// Route a book or trade message to its queue by kind
    pub fn push(&self, msg: OrderBookMessage) {
        use crate::adapters::types::OrderBookMessageKind;
        let result = match msg.kind {
            OrderBookMessageKind::Snapshot => self.snapshots.send(msg),
            OrderBookMessageKind::Diff => self.diffs.send(msg),
            OrderBookMessageKind::Trade => self.trades.send(msg),
        };
        if result.is_err() {
            tracing::debug!("Market data consumer dropped, message discarded");
        }
    }

    pub fn push_funding(&self, update: FundingInfoUpdate) {
        if self.funding.send(update).is_err() {
            tracing::debug!("Funding consumer dropped, update discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::types::{OrderBookMessageKind, PublicTrade, TradeType};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_push_routes_by_kind() {
        let (queues, mut rx) = market_data_channels();
        queues.push(OrderBookMessage::book(
            OrderBookMessageKind::Diff,
            "BTC-USDT0",
            1,
            1.0,
            vec![],
            vec![],
        ));
        queues.push(OrderBookMessage::trade(
            "BTC-USDT0",
            1.0,
            PublicTrade {
                trade_id: "1".into(),
                trade_type: TradeType::Sell,
                price: Decimal::ONE,
                amount: Decimal::ONE,
            },
        ));
        queues.push_funding(FundingInfoUpdate {
            trading_pair: "BTC-USDT0".into(),
            ..Default::default()
        });

        assert_eq!(rx.diffs.recv().await.unwrap().kind, OrderBookMessageKind::Diff);
        assert_eq!(rx.trades.recv().await.unwrap().kind, OrderBookMessageKind::Trade);
        assert_eq!(rx.funding.recv().await.unwrap().trading_pair, "BTC-USDT0");
        assert!(rx.snapshots.try_recv().is_err());
    }
}
