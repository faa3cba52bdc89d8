use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Print a success message; in JSON mode `data` fields are merged into the
/// top-level object.
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(fields)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(fields);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_output_accepts_non_object_data() {
        assert!(output_success(&OutputFormat::Json, "ok", Some(json!([1, 2]))).is_ok());
        assert!(output_success(&OutputFormat::Text, "ok", None).is_ok());
    }
}
