use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for persisted quotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

/// User performing an attributed operation (quote creation, status changes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub String);

/// Letter code of a vehicle group, e.g. `A` or `B+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupCode(pub String);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GroupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of vehicles sharing maintenance characteristics. Maintained by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleGroup {
    pub code: GroupCode,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub revision_km: u32,
    pub revision_cost: Decimal,
    pub tire_km: u32,
    pub tire_cost: Decimal,
    /// Annual IPVA base for vehicles in the group.
    #[serde(default)]
    pub ipva_annual: Option<Decimal>,
    /// Annual licensing base for vehicles in the group.
    #[serde(default)]
    pub licensing_annual: Option<Decimal>,
}

/// A specific unit offered in a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub brand: String,
    pub model: String,
    pub year: u16,
    /// Acquisition value used as the base for depreciation and financial cost.
    pub value: Decimal,
    #[serde(default)]
    pub is_used: bool,
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub odometer_km: Option<u32>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    pub group_code: GroupCode,
    /// Vehicle-specific IPVA base, takes precedence over the group's.
    #[serde(default)]
    pub ipva_annual: Option<Decimal>,
    #[serde(default)]
    pub licensing_annual: Option<Decimal>,
}

impl Vehicle {
    pub fn description(&self) -> String {
        format!("{} {} {}", self.brand, self.model, self.year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionTier {
    Basic,
    Intermediate,
    Premium,
}

/// Optional coverage tier with a resolved flat monthly cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionPlan {
    pub id: PlanId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: ProtectionTier,
    pub monthly_cost: Decimal,
}

/// Parameters governing the cost of a single vehicle line, or of every line when set globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractParameters {
    pub contract_months: u16,
    pub monthly_km: u32,
    pub operation_severity: u8,
    #[serde(default)]
    pub has_tracking: bool,
    #[serde(default)]
    pub protection_plan_id: Option<PlanId>,
    #[serde(default)]
    pub include_ipva: bool,
    #[serde(default)]
    pub include_licensing: bool,
    #[serde(default)]
    pub include_taxes: bool,
}

/// SELIC rates keyed by contract duration bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelicRates {
    pub month12: Decimal,
    pub month18: Decimal,
    pub month24: Decimal,
}

/// Externally maintained rates. `ipca` and `igpm` are stored for reference only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxIndexSnapshot {
    pub reference_date: NaiveDate,
    pub ipca: Decimal,
    pub igpm: Decimal,
    /// Annual spread in percent added on top of SELIC.
    pub spread: Decimal,
    pub selic: SelicRates,
}

/// Contract-duration bucket selecting the SELIC rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelicBucket {
    Month12,
    Month18,
    Month24,
}

impl SelicBucket {
    pub const fn for_contract(contract_months: u16) -> Self {
        match contract_months {
            0..=12 => Self::Month12,
            13..=18 => Self::Month18,
            _ => Self::Month24,
        }
    }

    pub const fn months(self) -> u16 {
        match self {
            Self::Month12 => 12,
            Self::Month18 => 18,
            Self::Month24 => 24,
        }
    }

    pub fn rate(self, rates: &SelicRates) -> Decimal {
        match self {
            Self::Month12 => rates.month12,
            Self::Month18 => rates.month18,
            Self::Month24 => rates.month24,
        }
    }
}

/// Monthly cost breakdown for one vehicle, echoing the parameters it was priced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResultVehicle {
    pub vehicle_id: VehicleId,
    pub group_code: GroupCode,
    pub description: String,
    pub vehicle_value: Decimal,
    pub depreciation_cost: Decimal,
    pub maintenance_cost: Decimal,
    pub tracking_cost: Decimal,
    pub protection_cost: Decimal,
    pub ipva_cost: Decimal,
    pub licensing_cost: Decimal,
    pub tax_cost: Decimal,
    /// Marginal rate per km above the allowance; not part of `total_cost`.
    pub extra_km_rate: Decimal,
    pub total_cost: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selic_bucket: Option<SelicBucket>,
    pub parameters: ContractParameters,
    /// Whether the line follows the quote's global parameters.
    #[serde(default)]
    pub uses_global_parameters: bool,
}

/// High level status tracked throughout the proposal workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteStatus {
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "ORCAMENTO")]
    Orcamento,
    #[serde(rename = "PROPOSTA_GERADA")]
    PropostaGerada,
    #[serde(rename = "EM_VERIFICACAO")]
    EmVerificacao,
    #[serde(rename = "APROVADA")]
    Aprovada,
    #[serde(rename = "CONTRATO_GERADO")]
    ContratoGerado,
    #[serde(rename = "ASSINATURA_CLIENTE")]
    AssinaturaCliente,
    #[serde(rename = "ASSINATURA_DIRETORIA")]
    AssinaturaDiretoria,
    #[serde(rename = "AGENDAMENTO_ENTREGA")]
    AgendamentoEntrega,
    #[serde(rename = "ENTREGA")]
    Entrega,
    #[serde(rename = "CONCLUIDO")]
    Concluido,
    #[serde(rename = "CANCELADO")]
    Cancelado,
}

impl QuoteStatus {
    /// Linear progression; `Cancelado` sits outside it.
    pub const fn ordered() -> [Self; 11] {
        [
            Self::Draft,
            Self::Orcamento,
            Self::PropostaGerada,
            Self::EmVerificacao,
            Self::Aprovada,
            Self::ContratoGerado,
            Self::AssinaturaCliente,
            Self::AssinaturaDiretoria,
            Self::AgendamentoEntrega,
            Self::Entrega,
            Self::Concluido,
        ]
    }

    pub const fn all() -> [Self; 12] {
        [
            Self::Draft,
            Self::Orcamento,
            Self::PropostaGerada,
            Self::EmVerificacao,
            Self::Aprovada,
            Self::ContratoGerado,
            Self::AssinaturaCliente,
            Self::AssinaturaDiretoria,
            Self::AgendamentoEntrega,
            Self::Entrega,
            Self::Concluido,
            Self::Cancelado,
        ]
    }

    /// Wire code persisted alongside quotes.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Orcamento => "ORCAMENTO",
            Self::PropostaGerada => "PROPOSTA_GERADA",
            Self::EmVerificacao => "EM_VERIFICACAO",
            Self::Aprovada => "APROVADA",
            Self::ContratoGerado => "CONTRATO_GERADO",
            Self::AssinaturaCliente => "ASSINATURA_CLIENTE",
            Self::AssinaturaDiretoria => "ASSINATURA_DIRETORIA",
            Self::AgendamentoEntrega => "AGENDAMENTO_ENTREGA",
            Self::Entrega => "ENTREGA",
            Self::Concluido => "CONCLUIDO",
            Self::Cancelado => "CANCELADO",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Rascunho",
            Self::Orcamento => "Orçamento",
            Self::PropostaGerada => "Proposta Gerada",
            Self::EmVerificacao => "Em Verificação",
            Self::Aprovada => "Aprovada",
            Self::ContratoGerado => "Contrato Gerado",
            Self::AssinaturaCliente => "Assinatura do Cliente",
            Self::AssinaturaDiretoria => "Assinatura da Diretoria",
            Self::AgendamentoEntrega => "Agendamento de Entrega",
            Self::Entrega => "Entrega",
            Self::Concluido => "Concluído",
            Self::Cancelado => "Cancelado",
        }
    }

    /// Position in [`QuoteStatus::ordered`]; `None` for `Cancelado`.
    pub fn position(self) -> Option<usize> {
        Self::ordered().iter().position(|status| *status == self)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|status| status.code().eq_ignore_ascii_case(code.trim()))
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Persisted quote aggregate. `total_value` is derived from the vehicle lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub client_id: ClientId,
    pub vehicles: Vec<QuoteResultVehicle>,
    pub total_value: Decimal,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: ActorId,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub global_parameters: Option<ContractParameters>,
}

/// Append-only audit record of a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub quote_id: QuoteId,
    pub previous_status: Option<QuoteStatus>,
    pub new_status: QuoteStatus,
    pub actor_id: ActorId,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}
