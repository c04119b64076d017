//! Print the Gemini models visible to GEMINI_API_KEY and whether each supports
//! `generateContent`. Useful for picking a GEMINI_MODEL value.

use exam_forge::config::GeminiConfig;
use exam_forge::gemini::Gemini;
use exam_forge::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let gemini = Gemini::new(GeminiConfig::from_env()?)?;
  let models = gemini.list_models().await?;

  println!("Available models supporting generateContent:");
  let mut usable = 0usize;
  for m in models.iter().filter(|m| m.supports_generate_content()) {
    println!("- {} ({})", m.name, m.display_name);
    usable += 1;
  }
  if usable == 0 {
    println!("(none)");
  }
  println!("{} models listed in total.", models.len());
  Ok(())
}
