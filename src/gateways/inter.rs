use crate::domain::charge::ChargeType;
use crate::domain::money::{format_minor, parse_minor};
use crate::error::PipelineError;
use crate::gateways::fees::FeeSchedule;
use crate::gateways::{
    ChargeRequest, PaymentProvider, ProviderCharge, ProviderChargeStatus, ProviderTransfer,
    ProviderTransferState, TransferRequest,
};
use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

/// Banco Inter PIX v2 (cob/cobv for charges, banking v2 for outbound PIX).
pub struct InterProvider {
    pub base_url: String,
    pub access_token: String,
    pub account: String,
    pub pix_key: String,
    pub timeout_ms: u64,
    pub fees: FeeSchedule,
    pub client: reqwest::Client,
}

impl InterProvider {
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_token)
            .header("x-conta-corrente", &self.account)
            .timeout(Duration::from_millis(self.timeout_ms))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<(StatusCode, Value)> {
        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(PipelineError::ProviderTimeout(Duration::from_millis(self.timeout_ms)).into())
            }
            Err(e) => return Err(anyhow!("inter network error: {}", e)),
        };
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let value = serde_json::from_str::<Value>(&body).unwrap_or(Value::Null);

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow!(
                "inter HTTP_{}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            ));
        }
        Ok((status, value))
    }
}

fn charge_status(raw: &str) -> ProviderChargeStatus {
    match raw {
        "CONCLUIDA" => ProviderChargeStatus::Paid,
        "ATIVA" => ProviderChargeStatus::Active,
        _ => ProviderChargeStatus::Removed,
    }
}

fn parse_charge(txid: &str, v: &Value) -> ProviderCharge {
    let first_pix = v.get("pix").and_then(|p| p.as_array()).and_then(|a| a.first());
    ProviderCharge {
        txid: v
            .get("txid")
            .and_then(|t| t.as_str())
            .unwrap_or(txid)
            .to_string(),
        status: charge_status(v.get("status").and_then(|s| s.as_str()).unwrap_or("")),
        pix_copy_paste: v
            .get("pixCopiaECola")
            .and_then(|s| s.as_str())
            .map(ToString::to_string),
        end_to_end_id: first_pix
            .and_then(|p| p.get("endToEndId"))
            .and_then(|s| s.as_str())
            .map(ToString::to_string),
        paid_amount_minor: first_pix.and_then(|p| p.get("valor")).and_then(parse_minor),
    }
}

/// Maps `transacaoPix.status` from the banking API.
pub fn transfer_state(raw: &str, detail: Option<&str>) -> ProviderTransferState {
    match raw {
        "EFETIVADO" | "PIX_ENVIADO" => ProviderTransferState::Completed,
        "CANCELADO" | "FALHA" | "EXPIRADO" | "NAO_REALIZADO" => {
            ProviderTransferState::Failed(detail.unwrap_or(raw).to_string())
        }
        _ => ProviderTransferState::InFlight,
    }
}

#[async_trait::async_trait]
impl PaymentProvider for InterProvider {
    fn name(&self) -> &'static str {
        "inter"
    }

    async fn create_charge(&self, request: ChargeRequest) -> Result<ProviderCharge> {
        let mut body = json!({
            "valor": { "original": format_minor(request.amount_minor) },
            "chave": self.pix_key,
            "solicitacaoPagador": request.description,
        });
        if let (Some(name), Some(doc)) = (&request.payer_name, &request.payer_document) {
            let doc_field = if doc.len() > 11 { "cnpj" } else { "cpf" };
            body["devedor"] = json!({ "nome": name, doc_field: doc });
        }

        let path = match (request.charge_type, request.due_date) {
            (ChargeType::Scheduled, Some(due)) => {
                body["calendario"] = json!({
                    "dataDeVencimento": due.format("%Y-%m-%d").to_string(),
                    "validadeAposVencimento": 30
                });
                format!("/pix/v2/cobv/{}", request.txid)
            }
            _ => {
                body["calendario"] = json!({ "expiracao": 86_400 });
                format!("/pix/v2/cob/{}", request.txid)
            }
        };

        let (status, v) = self.send(self.request(reqwest::Method::PUT, &path).json(&body)).await?;
        if !status.is_success() {
            return Err(anyhow!("inter rejected charge {}: HTTP_{} {}", request.txid, status.as_u16(), v));
        }
        Ok(parse_charge(&request.txid, &v))
    }

    async fn query_charge(&self, txid: &str) -> Result<ProviderCharge> {
        let (status, v) = self
            .send(self.request(reqwest::Method::GET, &format!("/pix/v2/cob/{}", txid)))
            .await?;
        if !status.is_success() {
            return Err(anyhow!("inter charge lookup {} failed: HTTP_{}", txid, status.as_u16()));
        }
        Ok(parse_charge(txid, &v))
    }

    async fn create_transfer(&self, request: TransferRequest) -> Result<ProviderTransfer> {
        let body = json!({
            "valor": format_minor(request.amount_minor),
            "descricao": request.description,
            "destinatario": { "tipo": "CHAVE", "chave": request.pix_key },
        });
        let (status, v) = self
            .send(
                self.request(reqwest::Method::POST, "/banking/v2/pix")
                    .header("x-id-idempotente", &request.idempotency_key)
                    .json(&body),
            )
            .await?;

        if status.is_client_error() {
            let reason = v
                .get("title")
                .or_else(|| v.get("detail"))
                .and_then(|s| s.as_str())
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("HTTP_{}", status.as_u16()));
            return Ok(ProviderTransfer {
                provider_transfer_id: None,
                state: ProviderTransferState::Failed(reason),
            });
        }

        let provider_transfer_id = v
            .get("codigoSolicitacao")
            .and_then(|s| s.as_str())
            .map(ToString::to_string);
        let state = match v.get("tipoRetorno").and_then(|s| s.as_str()) {
            Some("PROCESSADO") => ProviderTransferState::Completed,
            _ => ProviderTransferState::InFlight,
        };
        Ok(ProviderTransfer {
            provider_transfer_id,
            state,
        })
    }

    async fn query_transfer(&self, reference: &str) -> Result<ProviderTransfer> {
        let (status, v) = self
            .send(self.request(reqwest::Method::GET, &format!("/banking/v2/pix/{}", reference)))
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(ProviderTransfer {
                provider_transfer_id: None,
                state: ProviderTransferState::NotFound,
            });
        }
        if !status.is_success() {
            return Err(anyhow!("inter transfer lookup {} failed: HTTP_{}", reference, status.as_u16()));
        }

        let tx = v.get("transacaoPix").unwrap_or(&v);
        let raw_status = tx.get("status").and_then(|s| s.as_str()).unwrap_or("");
        let detail = v
            .get("historico")
            .and_then(|h| h.as_array())
            .and_then(|h| h.last())
            .and_then(|h| h.get("descricao"))
            .and_then(|s| s.as_str());
        Ok(ProviderTransfer {
            provider_transfer_id: tx
                .get("endToEndId")
                .or_else(|| tx.get("codigoSolicitacao"))
                .and_then(|s| s.as_str())
                .map(ToString::to_string)
                .or_else(|| Some(reference.to_string())),
            state: transfer_state(raw_status, detail),
        })
    }

    async fn list_recent_payments(
        &self,
        since: chrono::DateTime<chrono::Utc>,
        until: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        let mut page = 0_u32;
        loop {
            let query = [
                ("inicio", since.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
                ("fim", until.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
                ("paginacao.paginaAtual", page.to_string()),
                ("paginacao.itensPorPagina", "100".to_string()),
            ];
            let (status, v) = self
                .send(self.request(reqwest::Method::GET, "/pix/v2/pix").query(&query))
                .await?;
            if !status.is_success() {
                return Err(anyhow!("inter payment listing failed: HTTP_{}", status.as_u16()));
            }

            if let Some(items) = v.get("pix").and_then(|p| p.as_array()) {
                out.extend(items.iter().cloned());
            }
            let pages = v
                .pointer("/parametros/paginacao/quantidadeDePaginas")
                .and_then(|p| p.as_u64())
                .unwrap_or(1);
            page += 1;
            if u64::from(page) >= pages {
                break;
            }
        }
        Ok(out)
    }

    fn fee(&self, amount_minor: i64, charge_type: ChargeType) -> i64 {
        self.fees.fee(amount_minor, charge_type)
    }
}
