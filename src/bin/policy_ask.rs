use anyhow::{bail, Context, Result};
use clap::Parser;
use policy_rag::{Document, PipelineArgs, ProviderArgs, QaEngine, Service};

#[derive(Parser, Debug)]
#[command(
    name = "policy-ask",
    about = "Index the policy document and answer questions without starting the server"
)]
struct AskCli {
    /// Question to answer (repeat for a batch)
    #[arg(long = "question", short = 'q', required = true)]
    questions: Vec<String>,

    /// Only print the retrieved context for each question (skip the LLM call)
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AskCli::parse();
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    });
    builder.init();

    let settings = cli.pipeline.build_settings();
    let embedder = cli.provider.build_embedder()?;
    let generator = cli.provider.build_generator()?;
    let document = Document::load(&cli.pipeline.document)
        .await
        .with_context(|| format!("failed to load {}", cli.pipeline.document.display()))?;
    let engine = QaEngine::build(&document, settings, embedder, generator)
        .await
        .context("failed to index document")?;
    if engine.index_len() == 0 {
        bail!("document produced no segments");
    }

    if cli.dry_run {
        for question in &cli.questions {
            let hits = engine.retrieve(question).await?;
            println!("--- {question} ---");
            for hit in hits {
                println!(
                    "[page {} | chunk {} | score {:.4}]\n{}\n",
                    hit.segment.page,
                    hit.segment.chunk_id,
                    hit.score,
                    hit.segment.text.trim()
                );
            }
        }
        return Ok(());
    }

    let service = Service::Ready(engine.into());
    let answers = service.run_batch(&cli.questions).await?;
    for (question, answer) in cli.questions.iter().zip(answers) {
        println!("Q: {question}\nA: {answer}\n");
    }
    Ok(())
}
