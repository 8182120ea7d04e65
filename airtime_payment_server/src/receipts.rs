//! Receipt rendering for settled transactions.
//!
//! A [`Receipt`] is built from a transaction in the `Success` state; asking for one on a pending or failed
//! transaction is a 409. Rendering is behind the [`ReceiptRenderer`] trait so that the HTML view the server ships
//! is not the only possible one.

use airtime_payment_engine::db_types::{Transaction, TransactionKind, TransactionStatus};
use apg_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub reference: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub bonus: Money,
    pub fee: Money,
    pub provider: String,
    pub msisdn: Option<String>,
    pub receipt_code: Option<String>,
    pub settled_at: DateTime<Utc>,
}

impl TryFrom<&Transaction> for Receipt {
    type Error = ServerError;

    fn try_from(txn: &Transaction) -> Result<Self, Self::Error> {
        if txn.status != TransactionStatus::Success {
            return Err(ServerError::Conflict(format!(
                "No receipt for [{}]: the transaction is {}",
                txn.reference, txn.status
            )));
        }
        Ok(Receipt {
            reference: txn.reference.to_string(),
            kind: txn.kind,
            amount: txn.amount,
            bonus: txn.bonus,
            fee: txn.fee,
            provider: txn.provider.clone(),
            msisdn: txn.msisdn.clone(),
            receipt_code: txn.receipt_code.clone(),
            settled_at: txn.updated_at,
        })
    }
}

impl Receipt {
    fn title(&self) -> &'static str {
        match self.kind {
            TransactionKind::Deposit => "Deposit receipt",
            TransactionKind::AirtimePurchase => "Airtime receipt",
            TransactionKind::DirectPurchase => "Airtime receipt",
            TransactionKind::Conversion => "Conversion receipt",
            TransactionKind::Adjustment => "Adjustment receipt",
        }
    }
}

pub trait ReceiptRenderer {
    fn render(&self, receipt: &Receipt) -> String;
}

/// Renders a receipt as a small self-contained HTML page.
pub struct HtmlReceiptRenderer;

impl ReceiptRenderer for HtmlReceiptRenderer {
    fn render(&self, receipt: &Receipt) -> String {
        let mut rows = vec![
            ("Reference", receipt.reference.clone()),
            ("Amount", receipt.amount.to_string()),
        ];
        if receipt.bonus > Money::default() {
            rows.push(("Bonus", receipt.bonus.to_string()));
        }
        if receipt.fee > Money::default() {
            rows.push(("Fee", receipt.fee.to_string()));
        }
        rows.push(("Provider", receipt.provider.clone()));
        if let Some(msisdn) = &receipt.msisdn {
            rows.push(("Phone", msisdn.clone()));
        }
        if let Some(code) = &receipt.receipt_code {
            rows.push(("Provider receipt", code.clone()));
        }
        rows.push(("Settled", receipt.settled_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
        let body = rows
            .into_iter()
            .map(|(label, value)| format!("    <tr><th>{label}</th><td>{value}</td></tr>\n"))
            .collect::<String>();
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
             <body>\n  <h1>{title}</h1>\n  <table>\n{body}  </table>\n</body>\n</html>\n",
            title = receipt.title(),
        )
    }
}

#[cfg(test)]
mod test {
    use airtime_payment_engine::db_types::TxReference;
    use chrono::Utc;

    use super::*;

    fn settled_deposit() -> Transaction {
        Transaction {
            id: 1,
            account_id: Some(7),
            kind: TransactionKind::Deposit,
            amount: Money::from_shillings(60),
            bonus: Money::from_shillings(6),
            fee: Money::default(),
            provider: "paynecta".to_string(),
            reference: TxReference::from("DEP-TEST00000001".to_string()),
            correlation_id: None,
            msisdn: Some("254712345678".to_string()),
            receipt_code: Some("QGH7TK91XP".to_string()),
            status: TransactionStatus::Success,
            payload: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn settled_transactions_render_a_receipt() {
        let receipt = Receipt::try_from(&settled_deposit()).unwrap();
        let html = HtmlReceiptRenderer.render(&receipt);
        assert!(html.contains("Deposit receipt"));
        assert!(html.contains("DEP-TEST00000001"));
        assert!(html.contains("QGH7TK91XP"));
        assert!(html.contains("Bonus"));
    }

    #[test]
    fn pending_transactions_have_no_receipt() {
        let mut txn = settled_deposit();
        txn.status = TransactionStatus::Pending;
        let err = Receipt::try_from(&txn).unwrap_err();
        assert!(matches!(err, ServerError::Conflict(_)));
    }
}
