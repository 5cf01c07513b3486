//! In-app notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::parse_column;
use crate::error::ApiError;

text_enum! {
    NotificacaoTipo {
        PropostaRecebida => "PROPOSTA_RECEBIDA",
        PropostaAceita => "PROPOSTA_ACEITA",
        PropostaRecusada => "PROPOSTA_RECUSADA",
        PropostaCancelada => "PROPOSTA_CANCELADA",
        VagaFechada => "VAGA_FECHADA",
        Sistema => "SISTEMA",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificacaoRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tipo: String,
    pub titulo: String,
    pub mensagem: Option<String>,
    pub dados: serde_json::Value,
    pub lida: bool,
    pub lida_em: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notificacao {
    pub id: Uuid,
    pub tipo: NotificacaoTipo,
    pub titulo: String,
    pub mensagem: Option<String>,
    pub dados: serde_json::Value,
    pub lida: bool,
    pub lida_em: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificacaoRow> for Notificacao {
    type Error = ApiError;

    fn try_from(row: NotificacaoRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tipo: parse_column(&row.tipo)?,
            titulo: row.titulo,
            mensagem: row.mensagem,
            dados: row.dados,
            lida: row.lida,
            lida_em: row.lida_em,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificacaoQuery {
    #[serde(default)]
    pub unread_only: Option<bool>,
    #[serde(default)]
    pub tipo: Option<NotificacaoTipo>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContagemNaoLidas {
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarcadasComoLidas {
    pub updated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_converts_with_typed_kind() {
        let row = NotificacaoRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tipo: "PROPOSTA_ACEITA".to_string(),
            titulo: "Proposta aceita".to_string(),
            mensagem: None,
            dados: json!({ "proposta_id": "x" }),
            lida: false,
            lida_em: None,
            created_at: Utc::now(),
        };
        let notificacao = Notificacao::try_from(row).unwrap();
        assert_eq!(notificacao.tipo, NotificacaoTipo::PropostaAceita);
        assert_eq!(
            serde_json::to_value(&notificacao).unwrap()["tipo"],
            json!("PROPOSTA_ACEITA")
        );
    }

    #[test]
    fn unknown_kind_in_storage_is_an_internal_error() {
        let row = NotificacaoRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tipo: "bid_received".to_string(),
            titulo: "x".to_string(),
            mensagem: None,
            dados: json!({}),
            lida: true,
            lida_em: None,
            created_at: Utc::now(),
        };
        assert!(matches!(
            Notificacao::try_from(row),
            Err(ApiError::Internal(_))
        ));
    }
}
