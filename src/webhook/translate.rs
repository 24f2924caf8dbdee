use crate::domain::event::StandardPaymentEvent;
use crate::domain::money::parse_minor;
use crate::error::PipelineError;
use anyhow::Result;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayId {
    Inter,
    C6,
    Mock,
}

struct FieldMap {
    txid: &'static [&'static str],
    end_to_end_id: &'static [&'static str],
    amount: &'static [&'static str],
    paid_at: &'static [&'static str],
}

const INTER_FIELDS: FieldMap = FieldMap {
    txid: &["txid"],
    end_to_end_id: &["endToEndId"],
    amount: &["valor"],
    paid_at: &["horario"],
};

const C6_FIELDS: FieldMap = FieldMap {
    txid: &["txid", "txId"],
    end_to_end_id: &["endToEndId", "e2eId"],
    amount: &["valor", "amount"],
    paid_at: &["horario", "paymentDate"],
};

const MOCK_FIELDS: FieldMap = FieldMap {
    txid: &["txid", "transaction_id"],
    end_to_end_id: &["endToEndId", "end_to_end_id"],
    amount: &["valor", "amount"],
    paid_at: &["horario", "paid_at"],
};

impl GatewayId {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "inter" => Ok(GatewayId::Inter),
            "c6" => Ok(GatewayId::C6),
            "mock" => Ok(GatewayId::Mock),
            other => Err(PipelineError::UnknownGateway(other.to_string()).into()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayId::Inter => "inter",
            GatewayId::C6 => "c6",
            GatewayId::Mock => "mock",
        }
    }

    fn fields(&self) -> &'static FieldMap {
        match self {
            GatewayId::Inter => &INTER_FIELDS,
            GatewayId::C6 => &C6_FIELDS,
            GatewayId::Mock => &MOCK_FIELDS,
        }
    }

    /// A flat callback counts as a payment only if it names a transaction id
    /// and an amount in this gateway's vocabulary.
    pub fn looks_like_payment(&self, raw: &Value) -> bool {
        let f = self.fields();
        first_str(raw, f.txid).is_some() && first(raw, f.amount).is_some()
    }
}

fn first<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

fn first_str(raw: &Value, keys: &[&str]) -> Option<String> {
    first(raw, keys)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Maps one gateway payment item to the standard event. An unknown gateway
/// id is a configuration error and fails fast.
pub fn translate(gateway_id: &str, raw: &Value) -> Result<StandardPaymentEvent> {
    let gateway = GatewayId::parse(gateway_id)?;
    let f = gateway.fields();

    let txid = first_str(raw, f.txid);
    let end_to_end_id = first_str(raw, f.end_to_end_id);
    if txid.is_none() && end_to_end_id.is_none() {
        return Err(PipelineError::MalformedPayload("missing txid and endToEndId".to_string()).into());
    }

    let amount_minor = first(raw, f.amount)
        .and_then(parse_minor)
        .filter(|a| *a > 0)
        .ok_or_else(|| PipelineError::MalformedPayload("missing or invalid amount".to_string()))?;

    let paid_at = first_str(raw, f.paid_at)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);

    Ok(StandardPaymentEvent {
        gateway_transaction_id: txid.unwrap_or_default(),
        end_to_end_id,
        amount_minor,
        paid_at,
        gateway: gateway.as_str().to_string(),
        raw: raw.clone(),
    })
}
