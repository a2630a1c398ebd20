//! Human-readable names for clusters.
//!
//! Each real cluster gets a frequency summary of its categorical fields and a
//! single LLM call asking for `{name, description, commonalities}`. Any
//! failure falls back to a name derived from the same frequency tallies, so
//! insight generation never fails the request.

use anyhow::Context;
use futures_util::future::join_all;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::llm::generate::{strip_code_fences, TextGenerator};
use crate::models::{ClusterInsight, ClusterPoint};

pub const NOISE_CLUSTER_ID: i32 = -1;
pub const NOISE_NAME: &str = "Participantes sem cluster";
pub const NOISE_DESCRIPTION: &str =
    "Participantes com perfis singulares que não formam um grupo denso com os demais.";

const TOP_ROLES: usize = 5;
const TOP_COMPANIES: usize = 3;
const TOP_SECTORS: usize = 3;
const TOP_PROGRAMS: usize = 3;

/// Frequency tallies of one cluster's categorical fields, most frequent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterTally {
    pub roles: Vec<(String, usize)>,
    pub companies: Vec<(String, usize)>,
    pub sectors: Vec<(String, usize)>,
    pub programs: Vec<(String, usize)>,
}

impl ClusterTally {
    pub fn from_points(points: &[&ClusterPoint]) -> Self {
        Self {
            roles: top_values(points.iter().map(|p| p.metadata.role.as_deref()), TOP_ROLES),
            companies: top_values(
                points.iter().map(|p| p.metadata.company.as_deref()),
                TOP_COMPANIES,
            ),
            sectors: top_values(
                points.iter().map(|p| p.metadata.sector.as_deref()),
                TOP_SECTORS,
            ),
            programs: top_values(
                points.iter().map(|p| p.metadata.program.as_deref()),
                TOP_PROGRAMS,
            ),
        }
    }

    pub fn main_sector(&self) -> Option<&str> {
        self.sectors.first().map(|(s, _)| s.as_str())
    }
}

/// Count non-empty values and keep the `n` most frequent (ties by value).
fn top_values<'a>(values: impl Iterator<Item = Option<&'a str>>, n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.flatten().map(str::trim).filter(|v| !v.is_empty()) {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

#[derive(Debug, Deserialize)]
struct InsightDraft {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    commonalities: Vec<String>,
}

/// Produce one insight per distinct cluster id, ordered by cluster id.
pub async fn generate_cluster_insights(
    generator: &dyn TextGenerator,
    points: &[ClusterPoint],
    temperature: f32,
) -> Vec<ClusterInsight> {
    let mut groups: BTreeMap<i32, Vec<&ClusterPoint>> = BTreeMap::new();
    for point in points {
        groups.entry(point.cluster_id).or_default().push(point);
    }

    let tasks = groups.into_iter().map(|(cluster_id, members)| async move {
        if cluster_id == NOISE_CLUSTER_ID {
            return noise_insight(members.len());
        }
        cluster_insight(generator, cluster_id, &members, temperature).await
    });

    join_all(tasks).await
}

fn noise_insight(count: usize) -> ClusterInsight {
    ClusterInsight {
        cluster_id: NOISE_CLUSTER_ID,
        name: NOISE_NAME.to_string(),
        description: NOISE_DESCRIPTION.to_string(),
        commonalities: Vec::new(),
        count,
    }
}

async fn cluster_insight(
    generator: &dyn TextGenerator,
    cluster_id: i32,
    members: &[&ClusterPoint],
    temperature: f32,
) -> ClusterInsight {
    let tally = ClusterTally::from_points(members);
    let prompt = build_prompt(&build_summary(members.len(), &tally));

    let drafted = generator
        .generate_text(&prompt, temperature)
        .await
        .and_then(|response| parse_insight(&response));

    match drafted {
        Ok(draft) => ClusterInsight {
            cluster_id,
            name: draft.name,
            description: draft.description,
            commonalities: draft.commonalities,
            count: members.len(),
        },
        Err(e) => {
            tracing::warn!(cluster_id, "Insight generation failed, using fallback: {e:#}");
            fallback_insight(cluster_id, members.len(), &tally)
        }
    }
}

fn build_summary(count: usize, tally: &ClusterTally) -> String {
    let mut summary = format!("Total de participantes: {count}\n");
    let mut section = |label: &str, values: &[(String, usize)]| {
        if !values.is_empty() {
            let joined: Vec<String> = values.iter().map(|(v, n)| format!("{v} ({n})")).collect();
            summary.push_str(&format!("{label}: {}\n", joined.join(", ")));
        }
    };
    section("Cargos mais comuns", &tally.roles);
    section("Empresas mais comuns", &tally.companies);
    section("Setores principais", &tally.sectors);
    section("Programas", &tally.programs);
    summary
}

fn build_prompt(summary: &str) -> String {
    format!(
        "Você está analisando um grupo de participantes de um programa de desenvolvimento \
         profissional que foram agrupados por similaridade de perfil.\n\n\
         {summary}\n\
         Responda APENAS com um objeto JSON, sem explicações, no formato:\n\
         {{\"name\": \"nome curto do grupo (até 5 palavras)\", \
         \"description\": \"uma frase descrevendo o grupo\", \
         \"commonalities\": [\"característica em comum\", \"...\"]}}"
    )
}

fn parse_insight(response: &str) -> anyhow::Result<InsightDraft> {
    let cleaned = strip_code_fences(response);

    let draft = match serde_json::from_str::<InsightDraft>(cleaned) {
        Ok(draft) => draft,
        Err(_) => {
            // Models sometimes wrap the object in prose
            let start = cleaned.find('{').context("No JSON object in insight response")?;
            let end = cleaned.rfind('}').context("No JSON object in insight response")?;
            anyhow::ensure!(start < end, "Malformed JSON object in insight response");
            serde_json::from_str::<InsightDraft>(&cleaned[start..=end])
                .context("Failed to parse insight JSON")?
        }
    };

    anyhow::ensure!(!draft.name.trim().is_empty(), "Insight response has an empty name");
    Ok(draft)
}

/// Deterministic insight built from the frequency tallies alone.
pub fn fallback_insight(cluster_id: i32, count: usize, tally: &ClusterTally) -> ClusterInsight {
    let name = match tally.main_sector() {
        Some(sector) => format!("Profissionais de {sector}"),
        None => format!("Cluster {}", cluster_id + 1),
    };

    let mut commonalities = Vec::new();
    if let Some((role, _)) = tally.roles.first() {
        commonalities.push(format!("Cargo frequente: {role}"));
    }
    if let Some(sector) = tally.main_sector() {
        commonalities.push(format!("Setor predominante: {sector}"));
    }
    if let Some((program, _)) = tally.programs.first() {
        commonalities.push(format!("Programa: {program}"));
    }
    if let Some((company, n)) = tally.companies.first() {
        if *n > 1 {
            commonalities.push(format!("Empresa em comum: {company}"));
        }
    }

    ClusterInsight {
        cluster_id,
        name,
        description: format!("Grupo de {count} participantes com perfis semelhantes."),
        commonalities,
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParticipantMetadata;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGenerator {
        response: anyhow::Result<String>,
        calls: AtomicUsize,
    }

    impl FixedGenerator {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err(anyhow::anyhow!("connection refused")),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate_text(&self, _prompt: &str, _temperature: f32) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn point(id: &str, cluster_id: i32, role: &str, sector: Option<&str>) -> ClusterPoint {
        ClusterPoint {
            participant_id: id.to_string(),
            x: 0.0,
            y: 0.0,
            cluster_id,
            metadata: ParticipantMetadata {
                participant_id: id.to_string(),
                name: id.to_string(),
                role: Some(role.to_string()),
                sector: sector.map(str::to_string),
                program: Some("Lideranças".to_string()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_llm_insight_parsed_from_fenced_json() {
        let generator = FixedGenerator::ok(
            "```json\n{\"name\": \"Líderes em Fintech\", \"description\": \"Gestoras do setor financeiro\", \"commonalities\": [\"Crédito\", \"Dados\"]}\n```",
        );
        let points = vec![
            point("a", 0, "CFO", Some("Financeiro")),
            point("b", 0, "CTO", Some("Financeiro")),
        ];

        let insights = generate_cluster_insights(&generator, &points, 0.7).await;
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].name, "Líderes em Fintech");
        assert_eq!(insights[0].commonalities.len(), 2);
        assert_eq!(insights[0].count, 2);
    }

    #[tokio::test]
    async fn test_noise_never_reaches_llm() {
        let generator = FixedGenerator::ok("{\"name\": \"x\"}");
        let points = vec![point("a", -1, "CFO", None), point("b", -1, "CEO", None)];

        let insights = generate_cluster_insights(&generator, &points, 0.7).await;
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].name, NOISE_NAME);
        assert_eq!(insights[0].count, 2);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_sector_name() {
        let generator = FixedGenerator::failing();
        let points = vec![
            point("a", 0, "Analista", Some("Saúde")),
            point("b", 0, "Médica", Some("Saúde")),
            point("c", 0, "Gestora", Some("Educação")),
        ];

        let insights = generate_cluster_insights(&generator, &points, 0.7).await;
        assert_eq!(insights[0].name, "Profissionais de Saúde");
        assert!(insights[0]
            .commonalities
            .contains(&"Setor predominante: Saúde".to_string()));
    }

    #[tokio::test]
    async fn test_llm_failure_without_sector_uses_cluster_number() {
        let generator = FixedGenerator::failing();
        let points = vec![point("a", 2, "Analista", None), point("b", 2, "Analista", None)];

        let insights = generate_cluster_insights(&generator, &points, 0.7).await;
        assert_eq!(insights[0].name, "Cluster 3");
        assert_eq!(insights[0].commonalities[0], "Cargo frequente: Analista");
    }

    #[tokio::test]
    async fn test_malformed_json_falls_back() {
        let generator = FixedGenerator::ok("Aqui está: {name: sem aspas}");
        let points = vec![point("a", 0, "CFO", Some("Varejo"))];

        let insights = generate_cluster_insights(&generator, &points, 0.7).await;
        assert_eq!(insights[0].name, "Profissionais de Varejo");
    }

    #[tokio::test]
    async fn test_insights_ordered_by_cluster_id() {
        let generator = FixedGenerator::failing();
        let points = vec![
            point("a", 1, "CFO", None),
            point("b", -1, "CEO", None),
            point("c", 0, "CTO", None),
        ];

        let insights = generate_cluster_insights(&generator, &points, 0.7).await;
        let ids: Vec<i32> = insights.iter().map(|i| i.cluster_id).collect();
        assert_eq!(ids, vec![-1, 0, 1]);
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let draft = parse_insight("Claro! {\"name\": \"Educadores\", \"commonalities\": []} Espero ter ajudado.")
            .unwrap();
        assert_eq!(draft.name, "Educadores");
        assert!(draft.description.is_empty());
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        assert!(parse_insight("{\"name\": \"  \"}").is_err());
    }

    #[test]
    fn test_tally_ranks_by_frequency_then_value() {
        let a = point("a", 0, "Analista", Some("Saúde"));
        let b = point("b", 0, "Gerente", Some("Saúde"));
        let c = point("c", 0, "Gerente", Some("Agro"));
        let tally = ClusterTally::from_points(&[&a, &b, &c]);
        assert_eq!(tally.roles[0], ("Gerente".to_string(), 2));
        assert_eq!(tally.roles[1], ("Analista".to_string(), 1));
        assert_eq!(tally.main_sector(), Some("Saúde"));
    }
}
