//! `values`: logical settings as the device reports them.

use tabled::Tabled;

use acsbridge_core::ResolvedBinding;

use crate::cli::{GlobalOpts, ValuesArgs};
use crate::error::CliError;
use crate::output;

use super::{Service, util};

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "RW")]
    rw: &'static str,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&ResolvedBinding> for ValueRow {
    fn from(b: &ResolvedBinding) -> Self {
        let mut value = b.value.to_string();
        if b.warning.is_some() {
            value.push_str(" (!)");
        }
        Self {
            key: b.key.to_string(),
            value,
            rw: if b.writable { "rw" } else { "ro" },
            path: b.path.clone(),
        }
    }
}

pub async fn handle(service: &Service, args: ValuesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = util::device_id(&args.device)?;
    let mut bindings = service.bindings(&device).await?;

    if let Some(category) = args.category {
        let catalog = service.catalog();
        bindings.retain(|b| catalog.get(b.key.as_str()).is_some_and(|e| e.category == category));
    }

    let out = output::render_list(
        &global.output,
        &bindings,
        |b| ValueRow::from(b),
        |b| format!("{}={}", b.key, b.value),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
