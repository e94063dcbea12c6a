use crate::infra::{
    load_reference, InMemoryQuoteRepository, InMemoryReferenceData, InMemoryStatusHistory,
};
use clap::Args;
use fleet_lease::config::AppConfig;
use fleet_lease::error::AppError;
use fleet_lease::workflows::quote::{
    calculate_progress, ActorId, ClientId, ContractParameters, CostEngine, CreateQuoteRequest,
    PlanId, PreviewRequest, PricingWarning, Quote, QuoteLineRequest, QuoteResultVehicle,
    QuoteService, QuoteStatus, RepriceRequest, TransitionRequest, VehicleId, VehicleSelector,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct PriceArgs {
    /// Catalog vehicle id to price
    #[arg(long, default_value = "v-onix")]
    pub(crate) vehicle: String,
    /// Look the vehicle up by plate instead of id (used vehicles)
    #[arg(long)]
    pub(crate) plate: Option<String>,
    /// Contract length in months
    #[arg(long, default_value_t = 24)]
    pub(crate) months: u16,
    /// Monthly kilometre allowance
    #[arg(long, default_value_t = 2_000)]
    pub(crate) km: u32,
    /// Operation severity from 1 (light) to 6 (heavy)
    #[arg(long, default_value_t = 3)]
    pub(crate) severity: u8,
    #[arg(long)]
    pub(crate) tracking: bool,
    /// Protection plan id, e.g. pp-basic
    #[arg(long)]
    pub(crate) plan: Option<String>,
    #[arg(long)]
    pub(crate) ipva: bool,
    #[arg(long)]
    pub(crate) licensing: bool,
    /// Include the SELIC-based financial cost
    #[arg(long)]
    pub(crate) taxes: bool,
    /// Print the breakdown as JSON
    #[arg(long)]
    pub(crate) json: bool,
    /// CSV export of vehicle groups replacing the seeded catalog
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// CSV export of vehicle groups replacing the seeded catalog
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Cancel the quote after approval instead of carrying it through delivery
    #[arg(long)]
    pub(crate) cancel: bool,
}

type DemoService = QuoteService<InMemoryQuoteRepository, InMemoryStatusHistory, InMemoryReferenceData>;

fn build_service(
    catalog: Option<PathBuf>,
) -> Result<(DemoService, Arc<InMemoryReferenceData>), AppError> {
    let config = AppConfig::load()?;
    let reference = Arc::new(load_reference(catalog.as_deref())?);
    let service = QuoteService::new(
        Arc::new(InMemoryQuoteRepository::default()),
        Arc::new(InMemoryStatusHistory::default()),
        reference.clone(),
        CostEngine::new(config.pricing),
    );
    Ok((service, reference))
}

pub(crate) fn run_price(args: PriceArgs) -> Result<(), AppError> {
    let (service, _) = build_service(args.catalog.clone())?;

    let selector = match args.plate {
        Some(plate) => VehicleSelector {
            vehicle_id: None,
            plate: Some(plate),
        },
        None => VehicleSelector {
            vehicle_id: Some(VehicleId(args.vehicle)),
            plate: None,
        },
    };
    let parameters = ContractParameters {
        contract_months: args.months,
        monthly_km: args.km,
        operation_severity: args.severity,
        has_tracking: args.tracking,
        protection_plan_id: args.plan.map(PlanId),
        include_ipva: args.ipva,
        include_licensing: args.licensing,
        include_taxes: args.taxes,
    };

    let priced = service.preview(PreviewRequest {
        vehicle: selector,
        parameters,
    })?;

    if args.json {
        match serde_json::to_string_pretty(&priced) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("Breakdown unavailable as JSON: {err}"),
        }
        return Ok(());
    }

    render_breakdown(&priced.result);
    render_warnings(&priced.warnings);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let (service, reference) = build_service(args.catalog)?;

    println!("Fleet lease quote demo");
    println!("Catalog vehicles:");
    for vehicle in reference.vehicles() {
        let plate = vehicle.plate.as_deref().unwrap_or("0km");
        println!(
            "  - {} {} (group {}, {}) R$ {}",
            vehicle.id, vehicle.description(), vehicle.group_code, plate, vehicle.value
        );
    }

    let global = ContractParameters {
        contract_months: 24,
        monthly_km: 2_500,
        operation_severity: 3,
        has_tracking: true,
        protection_plan_id: Some(PlanId("pp-basic".to_string())),
        include_ipva: true,
        include_licensing: true,
        include_taxes: true,
    };
    let heavy_duty = ContractParameters {
        monthly_km: 4_000,
        operation_severity: 6,
        protection_plan_id: Some(PlanId("pp-premium".to_string())),
        ..global.clone()
    };

    let request = CreateQuoteRequest {
        client_id: ClientId("cli-transportes-aurora".to_string()),
        created_by: ActorId("consultor.demo".to_string()),
        global_parameters: Some(global.clone()),
        vehicles: vec![
            line(Some("v-onix"), None, None),
            line(None, Some("rio2a19"), None),
            line(Some("v-hilux"), None, Some(heavy_duty)),
        ],
        save_as_draft: false,
    };

    let created = service.create(request)?;
    let quote_id = created.quote.id.clone();
    println!("\nCreated quote {}", quote_id);
    render_quote(&created.quote);
    render_warnings(&created.warnings);

    let repriced = service.reprice(
        &quote_id,
        RepriceRequest {
            actor_id: ActorId("consultor.demo".to_string()),
            global_parameters: Some(ContractParameters {
                contract_months: 36,
                ..global
            }),
            lines: Vec::new(),
        },
    )?;
    println!(
        "\nRepriced to 36 months: R$ {} -> R$ {}",
        created.quote.total_value, repriced.quote.total_value
    );

    let skip = service.transition(
        &quote_id,
        TransitionRequest {
            actor_id: ActorId("consultor.demo".to_string()),
            next_status: QuoteStatus::Aprovada,
            observation: None,
            expected_status: None,
        },
    );
    if let Err(err) = skip {
        println!("\nSkipping ahead is refused: {err}");
    }

    let path: &[QuoteStatus] = if args.cancel {
        &[
            QuoteStatus::PropostaGerada,
            QuoteStatus::EmVerificacao,
            QuoteStatus::Aprovada,
            QuoteStatus::Cancelado,
        ]
    } else {
        &[
            QuoteStatus::PropostaGerada,
            QuoteStatus::EmVerificacao,
            QuoteStatus::Aprovada,
            QuoteStatus::ContratoGerado,
            QuoteStatus::AssinaturaCliente,
            QuoteStatus::AssinaturaDiretoria,
            QuoteStatus::AgendamentoEntrega,
            QuoteStatus::Entrega,
            QuoteStatus::Concluido,
        ]
    };

    println!("\nWorkflow");
    println!(
        "  {:<24} {:>3}%",
        created.quote.status.label(),
        calculate_progress(created.quote.status)
    );
    for next_status in path {
        let receipt = service.transition(
            &quote_id,
            TransitionRequest {
                actor_id: ActorId("diretoria.demo".to_string()),
                next_status: *next_status,
                observation: None,
                expected_status: None,
            },
        )?;
        println!(
            "  {:<24} {:>3}%{}",
            receipt.quote.status.label(),
            receipt.progress,
            if receipt.audit_recorded { "" } else { " (audit missing)" }
        );
    }

    let options = service.transition_options(&quote_id)?;
    let allowed: Vec<&str> = options.allowed.iter().map(|option| option.label).collect();
    println!(
        "\nFrom {} the quote may move to: {}",
        options.current.label,
        if allowed.is_empty() {
            "nothing".to_string()
        } else {
            allowed.join(", ")
        }
    );

    println!("\nStatus history");
    for entry in service.history(&quote_id)? {
        let previous = entry
            .previous_status
            .map(|status| status.code())
            .unwrap_or("-");
        println!(
            "  {} {} -> {} by {}",
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            previous,
            entry.new_status,
            entry.actor_id.0
        );
    }

    Ok(())
}

fn line(
    vehicle_id: Option<&str>,
    plate: Option<&str>,
    parameters: Option<ContractParameters>,
) -> QuoteLineRequest {
    QuoteLineRequest {
        vehicle: VehicleSelector {
            vehicle_id: vehicle_id.map(|id| VehicleId(id.to_string())),
            plate: plate.map(str::to_string),
        },
        parameters,
    }
}

fn render_quote(quote: &Quote) {
    for vehicle in &quote.vehicles {
        let source = if vehicle.uses_global_parameters {
            "global"
        } else {
            "own"
        };
        println!(
            "  - {} [{} parameters]: R$ {}",
            vehicle.description, source, vehicle.total_cost
        );
    }
    println!(
        "  Total R$ {} ({}, {}%)",
        quote.total_value,
        quote.status.label(),
        calculate_progress(quote.status)
    );
}

fn render_breakdown(result: &QuoteResultVehicle) {
    println!("{} (group {})", result.description, result.group_code);
    println!("  Vehicle value     R$ {}", result.vehicle_value);
    println!("  Depreciation      R$ {}", result.depreciation_cost);
    println!("  Maintenance       R$ {}", result.maintenance_cost);
    println!("  Tracking          R$ {}", result.tracking_cost);
    println!("  Protection        R$ {}", result.protection_cost);
    println!("  IPVA              R$ {}", result.ipva_cost);
    println!("  Licensing         R$ {}", result.licensing_cost);
    match result.selic_bucket {
        Some(bucket) => println!(
            "  Financial cost    R$ {} (SELIC {}m)",
            result.tax_cost,
            bucket.months()
        ),
        None => println!("  Financial cost    R$ {}", result.tax_cost),
    }
    println!("  Monthly total     R$ {}", result.total_cost);
    println!("  Extra km          R$ {} per km", result.extra_km_rate);
}

fn render_warnings(warnings: &[PricingWarning]) {
    for warning in warnings {
        println!("  warning: {}", warning.summary());
    }
}
