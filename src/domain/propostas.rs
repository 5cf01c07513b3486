//! Proposals between a candidate and an institution's job
//!
//! A proposal is opened by either side (`Iniciador`) and answered by the
//! other. Contact details of the counterpart stay masked until it is
//! accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::auth::UserTipo;
use super::contato::Contato;
use super::parse_column;
use super::vagas::VagaStatus;
use crate::error::ApiError;
use crate::validation::ValidationErrors;

text_enum! {
    PropostaStatus {
        Enviada => "ENVIADA",
        Aceita => "ACEITA",
        Recusada => "RECUSADA",
    }
}

impl PropostaStatus {
    /// Only a pending proposal can be answered
    pub fn transition(&self, next: PropostaStatus) -> Result<PropostaStatus, ApiError> {
        match (self, next) {
            (PropostaStatus::Enviada, PropostaStatus::Aceita | PropostaStatus::Recusada) => Ok(next),
            _ => Err(ApiError::field(
                "status",
                format!("Não é possível alterar a proposta de {} para {}.", self, next),
            )),
        }
    }
}

text_enum! {
    /// Which side opened the proposal
    Iniciador {
        Candidato => "CANDIDATO",
        Instituicao => "INSTITUICAO",
    }
}

impl From<UserTipo> for Iniciador {
    fn from(tipo: UserTipo) -> Self {
        match tipo {
            UserTipo::Candidato => Iniciador::Candidato,
            UserTipo::Instituicao => Iniciador::Instituicao,
        }
    }
}

text_enum! {
    Direcao {
        Enviadas => "enviadas",
        Recebidas => "recebidas",
    }
}

/// Proposal joined with the job title and both parties
#[derive(Debug, Clone, FromRow)]
pub struct PropostaRow {
    pub id: Uuid,
    pub candidato_id: Uuid,
    pub vaga_id: Uuid,
    pub instituicao_id: Uuid,
    pub iniciador: String,
    pub mensagem: Option<String>,
    pub resposta: Option<String>,
    pub status: String,
    pub respondida_em: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub vaga_titulo: String,
    pub vaga_status: String,
    pub candidato_user_id: Uuid,
    pub candidato_nome: String,
    pub candidato_email: String,
    pub candidato_telefone: String,
    pub candidato_cpf: String,
    pub instituicao_user_id: Uuid,
    pub instituicao_nome: String,
    pub instituicao_email: String,
    pub instituicao_telefone: String,
}

impl PropostaRow {
    /// The side `user_id` is on, `None` for outsiders
    pub fn lado(&self, user_id: Uuid) -> Option<Iniciador> {
        if self.candidato_user_id == user_id {
            Some(Iniciador::Candidato)
        } else if self.instituicao_user_id == user_id {
            Some(Iniciador::Instituicao)
        } else {
            None
        }
    }

    pub fn status(&self) -> Result<PropostaStatus, ApiError> {
        parse_column(&self.status)
    }

    pub fn iniciador(&self) -> Result<Iniciador, ApiError> {
        parse_column(&self.iniciador)
    }

    /// User id of whoever did not open the proposal
    pub fn destinatario_user_id(&self) -> Result<Uuid, ApiError> {
        Ok(match self.iniciador()? {
            Iniciador::Candidato => self.instituicao_user_id,
            Iniciador::Instituicao => self.candidato_user_id,
        })
    }

    pub fn iniciador_user_id(&self) -> Result<Uuid, ApiError> {
        Ok(match self.iniciador()? {
            Iniciador::Candidato => self.candidato_user_id,
            Iniciador::Instituicao => self.instituicao_user_id,
        })
    }

    /// Accepting or rejecting: only the receiving side, only while pending.
    /// Accepting also needs the job to still be open; rejecting does not.
    pub fn responder(&self, user_id: Uuid, next: PropostaStatus) -> Result<PropostaStatus, ApiError> {
        let lado = self
            .lado(user_id)
            .ok_or_else(|| ApiError::forbidden("Você não participa desta proposta."))?;
        if lado == self.iniciador()? {
            return Err(ApiError::forbidden(
                "Somente o destinatário pode responder a proposta.",
            ));
        }
        let status = self.status()?.transition(next)?;

        let vaga_status: VagaStatus = parse_column(&self.vaga_status)?;
        if status == PropostaStatus::Aceita && vaga_status != VagaStatus::Ativa {
            return Err(ApiError::field(
                "status",
                "A vaga não está mais aberta; a proposta só pode ser recusada.",
            ));
        }
        Ok(status)
    }

    /// Withdrawing: only the initiator, only while pending
    pub fn retirar(&self, user_id: Uuid) -> Result<(), ApiError> {
        let lado = self
            .lado(user_id)
            .ok_or_else(|| ApiError::forbidden("Você não participa desta proposta."))?;
        if lado != self.iniciador()? {
            return Err(ApiError::forbidden(
                "Somente quem enviou a proposta pode cancelá-la.",
            ));
        }
        match self.status()? {
            PropostaStatus::Enviada => Ok(()),
            status => Err(ApiError::field(
                "status",
                format!("Uma proposta {} não pode ser cancelada.", status),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VagaResumo {
    pub id: Uuid,
    pub titulo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parte {
    pub id: Uuid,
    pub nome: String,
    pub contato: Contato,
}

#[derive(Debug, Clone, Serialize)]
pub struct Proposta {
    pub id: Uuid,
    pub status: PropostaStatus,
    pub iniciador: Iniciador,
    pub mensagem: Option<String>,
    pub resposta: Option<String>,
    pub respondida_em: Option<DateTime<Utc>>,
    pub vaga: VagaResumo,
    pub candidato: Parte,
    pub instituicao: Parte,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposta {
    /// Render for one of the parties; the viewer always sees their own
    /// contact, the counterpart's only once the proposal is accepted
    pub fn for_viewer(row: PropostaRow, viewer: Iniciador) -> Result<Self, ApiError> {
        let status = row.status()?;
        let aceita = status == PropostaStatus::Aceita;
        let candidato_liberado = aceita || viewer == Iniciador::Candidato;
        let instituicao_liberado = aceita || viewer == Iniciador::Instituicao;

        Ok(Self {
            id: row.id,
            status,
            iniciador: row.iniciador()?,
            mensagem: row.mensagem,
            resposta: row.resposta,
            respondida_em: row.respondida_em,
            vaga: VagaResumo {
                id: row.vaga_id,
                titulo: row.vaga_titulo,
            },
            candidato: Parte {
                id: row.candidato_id,
                contato: Contato::new(
                    &row.candidato_email,
                    &row.candidato_telefone,
                    Some(&row.candidato_cpf),
                    candidato_liberado,
                ),
                nome: row.candidato_nome,
            },
            instituicao: Parte {
                id: row.instituicao_id,
                contato: Contato::new(
                    &row.instituicao_email,
                    &row.instituicao_telefone,
                    None,
                    instituicao_liberado,
                ),
                nome: row.instituicao_nome,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Candidates send `{vaga_id}`; institutions also name the candidate
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePropostaRequest {
    pub vaga_id: Uuid,
    #[serde(default)]
    pub candidato_id: Option<Uuid>,
    #[serde(default)]
    pub mensagem: Option<String>,
}

impl CreatePropostaRequest {
    pub fn validate(&self, tipo: UserTipo) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if tipo == UserTipo::Instituicao {
            errors.check(
                self.candidato_id.is_some(),
                "candidato_id",
                "Informe o candidato convidado.",
            );
        }
        if let Some(mensagem) = &self.mensagem {
            errors.max_len("mensagem", mensagem, 2000);
        }
        errors.finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponderPropostaRequest {
    #[serde(default)]
    pub resposta: Option<String>,
}

impl ResponderPropostaRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(resposta) = &self.resposta {
            errors.max_len("resposta", resposta, 2000);
        }
        errors.finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PropostaQuery {
    pub status: Option<PropostaStatus>,
    pub direcao: Option<Direcao>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(iniciador: Iniciador, status: PropostaStatus) -> PropostaRow {
        PropostaRow {
            id: Uuid::new_v4(),
            candidato_id: Uuid::new_v4(),
            vaga_id: Uuid::new_v4(),
            instituicao_id: Uuid::new_v4(),
            iniciador: iniciador.to_string(),
            mensagem: Some("Tenho experiência com TEA.".to_string()),
            resposta: None,
            status: status.to_string(),
            respondida_em: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            vaga_titulo: "Apoio escolar".to_string(),
            vaga_status: "ATIVA".to_string(),
            candidato_user_id: Uuid::new_v4(),
            candidato_nome: "Maria".to_string(),
            candidato_email: "maria@example.com".to_string(),
            candidato_telefone: "11987654321".to_string(),
            candidato_cpf: "52998224725".to_string(),
            instituicao_user_id: Uuid::new_v4(),
            instituicao_nome: "Escola Aprender".to_string(),
            instituicao_email: "contato@escola.org".to_string(),
            instituicao_telefone: "4133334444".to_string(),
        }
    }

    #[test]
    fn only_pending_proposals_change_status() {
        use PropostaStatus::*;
        assert_eq!(Enviada.transition(Aceita).unwrap(), Aceita);
        assert_eq!(Enviada.transition(Recusada).unwrap(), Recusada);
        assert!(Enviada.transition(Enviada).is_err());
        assert!(Aceita.transition(Recusada).is_err());
        assert!(Recusada.transition(Aceita).is_err());
    }

    #[test]
    fn receiver_answers_initiator_cannot() {
        let proposta = row(Iniciador::Candidato, PropostaStatus::Enviada);
        let candidato = proposta.candidato_user_id;
        let instituicao = proposta.instituicao_user_id;

        assert_eq!(
            proposta.responder(instituicao, PropostaStatus::Aceita).unwrap(),
            PropostaStatus::Aceita
        );
        assert!(matches!(
            proposta.responder(candidato, PropostaStatus::Aceita),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            proposta.responder(Uuid::new_v4(), PropostaStatus::Aceita),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn answered_proposal_cannot_be_answered_again() {
        let proposta = row(Iniciador::Instituicao, PropostaStatus::Recusada);
        let candidato = proposta.candidato_user_id;
        assert!(matches!(
            proposta.responder(candidato, PropostaStatus::Aceita),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn closed_or_paused_job_cannot_be_accepted() {
        for vaga_status in [VagaStatus::Fechada, VagaStatus::Pausada] {
            let mut proposta = row(Iniciador::Instituicao, PropostaStatus::Enviada);
            proposta.vaga_status = vaga_status.to_string();
            let candidato = proposta.candidato_user_id;

            assert!(matches!(
                proposta.responder(candidato, PropostaStatus::Aceita),
                Err(ApiError::Validation(_))
            ));
            assert_eq!(
                proposta.responder(candidato, PropostaStatus::Recusada).unwrap(),
                PropostaStatus::Recusada
            );
        }
    }

    #[test]
    fn only_initiator_withdraws_pending() {
        let proposta = row(Iniciador::Instituicao, PropostaStatus::Enviada);
        assert!(proposta.retirar(proposta.instituicao_user_id).is_ok());
        assert!(matches!(
            proposta.retirar(proposta.candidato_user_id),
            Err(ApiError::Forbidden(_))
        ));

        let aceita = row(Iniciador::Instituicao, PropostaStatus::Aceita);
        assert!(matches!(
            aceita.retirar(aceita.instituicao_user_id),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn counterpart_contact_is_masked_until_accepted() {
        let pending = Proposta::for_viewer(
            row(Iniciador::Candidato, PropostaStatus::Enviada),
            Iniciador::Instituicao,
        )
        .unwrap();
        assert!(!pending.candidato.contato.liberado);
        assert_eq!(pending.candidato.contato.email, "ma***@example.com");
        assert_eq!(pending.candidato.contato.telefone, "(11) *****-4321");
        assert_eq!(pending.candidato.contato.cpf.as_deref(), Some("***.***.***-25"));
        assert!(pending.instituicao.contato.liberado);
        assert_eq!(pending.instituicao.contato.email, "contato@escola.org");

        let accepted = Proposta::for_viewer(
            row(Iniciador::Candidato, PropostaStatus::Aceita),
            Iniciador::Instituicao,
        )
        .unwrap();
        assert!(accepted.candidato.contato.liberado);
        assert_eq!(accepted.candidato.contato.email, "maria@example.com");
        assert_eq!(accepted.candidato.contato.cpf.as_deref(), Some("52998224725"));
    }

    #[test]
    fn institution_must_name_candidate() {
        let req = CreatePropostaRequest {
            vaga_id: Uuid::new_v4(),
            candidato_id: None,
            mensagem: None,
        };
        assert!(req.validate(UserTipo::Candidato).is_ok());
        assert!(req.validate(UserTipo::Instituicao).is_err());
    }

    #[test]
    fn direction_parses_lowercase() {
        assert_eq!("recebidas".parse::<Direcao>(), Ok(Direcao::Recebidas));
        assert!("RECEBIDAS".parse::<Direcao>().is_err());
    }
}
