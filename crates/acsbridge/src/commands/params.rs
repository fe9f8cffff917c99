//! `params`: the raw parameter tree, flattened.

use tabled::Tabled;

use acsbridge_core::navigator::{self, ParameterInfo};

use crate::cli::{GlobalOpts, ParamsArgs};
use crate::error::CliError;
use crate::output;

use super::{Service, util};

#[derive(Tabled)]
struct ParamRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Type")]
    wire_type: String,
    #[tabled(rename = "RW")]
    rw: &'static str,
}

impl From<&ParameterInfo> for ParamRow {
    fn from(p: &ParameterInfo) -> Self {
        Self {
            path: p.path.clone(),
            value: p.value.to_string(),
            wire_type: p.wire_type.clone(),
            rw: if p.writable { "rw" } else { "ro" },
        }
    }
}

pub async fn handle(service: &Service, args: ParamsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = util::device_id(&args.device)?;
    let mut params = service.parameters(&device, args.writable).await?;

    if let Some(ref wanted) = args.category {
        params = navigator::group_by_category(params)
            .into_iter()
            .filter(|(category, _)| category.eq_ignore_ascii_case(wanted))
            .flat_map(|(_, group)| group)
            .collect();
    }

    let out = output::render_list(
        &global.output,
        &params,
        |p| ParamRow::from(p),
        |p| format!("{}={}", p.path, p.value),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
