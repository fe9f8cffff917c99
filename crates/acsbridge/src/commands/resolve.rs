//! `resolve`: which candidate path a key lands on for one device.

use std::fmt::Write as _;

use acsbridge_core::KeyResolution;

use crate::cli::{GlobalOpts, ResolveArgs};
use crate::error::CliError;
use crate::output;

use super::{Service, util};

fn detail(r: &KeyResolution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Key:        {}", r.key);
    match &r.read {
        Some(b) => {
            let _ = writeln!(out, "Read path:  {}", b.path);
            let _ = writeln!(out, "Value:      {} (wire {:?}, {})", b.value, b.wire_value.to_string(), b.wire_type);
            if let Some(ref w) = b.warning {
                let _ = writeln!(out, "Warning:    {}", w.message);
            }
        }
        None => {
            let _ = writeln!(out, "Read path:  -");
        }
    }
    let _ = writeln!(out, "Write path: {}", output::or_dash(r.write_path.as_deref()));
    let _ = writeln!(out, "Candidates:");
    for c in &r.candidates {
        let mark = match (c.exists, c.has_value) {
            (true, true) => "value",
            (true, false) => "empty",
            (false, _) => "absent",
        };
        let _ = writeln!(out, "  {mark:<6} {}", c.path);
    }
    out.trim_end().to_owned()
}

pub async fn handle(service: &Service, args: ResolveArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = util::device_id(&args.device)?;
    let resolution = service.resolve_key(&device, &args.key).await?;

    let out = output::render_single(&global.output, &resolution, detail, |r| {
        output::or_dash(r.write_path.as_deref().or(r.read.as_ref().map(|b| b.path.as_str())))
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
