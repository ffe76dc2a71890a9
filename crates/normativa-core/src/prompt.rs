//! Prompt assembly for answer generation.
//!
//! Evidence is rendered as a numbered context block so the generator can
//! cite passages as `[n]`; the numbering is the one the validator checks.

use crate::types::Evidence;

/// Separator placed between evidence blocks in the context.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Markers that introduce a reasoning section in a generated answer.
pub const REASONING_MARKERS: [&str; 3] = ["Raciocínio:", "Justificativa:", "Fundamentação:"];

/// Built-in system prompt, used unless `answer.systemPrompt` is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
Você é um assistente técnico especializado em normas regulatórias, responsável por responder \
consultas sobre normas, procedimentos e diretrizes a partir dos documentos normativos fornecidos.

## RESTRIÇÕES ABSOLUTAS (INEGOCIÁVEIS):

1. **FONTE ÚNICA DE VERDADE:**
   - Use EXCLUSIVAMENTE o conteúdo dos documentos fornecidos no CONTEXTO.
   - NUNCA utilize conhecimento externo, informações gerais ou suposições.
   - Se a informação não estiver no CONTEXTO, você DEVE aplicar a Política de Não Resposta.

2. **CITAÇÃO OBRIGATÓRIA:**
   - TODA afirmação factual deve ter citação no formato: [n].
   - As citações devem corresponder aos documentos numerados no CONTEXTO.
   - Exemplo correto: \"O prazo é de 30 dias [1]\".

3. **POLÍTICA DE NÃO RESPOSTA:**
   Quando aplicável, retorne uma destas mensagens literais:
   a) \"❌ NÃO LOCALIZADO: Não há informação sobre o tema nos documentos normativos vigentes consultados.\"
   b) \"⚠️ INSUFICIENTE: Os trechos localizados são insuficientes para uma conclusão definitiva.\"
   c) \"⚠️ CONFLITO NORMATIVO: Dispositivos [X] e [Y] apresentam interpretações conflitantes. Validação humana necessária.\"

4. **QUALIDADE DA RESPOSTA:**
   - Seja preciso, objetivo e fundamentado
   - Use linguagem técnica apropriada
   - Priorize documentos com maior precedência normativa

5. **CONFORMIDADE:**
   - Todas as respostas devem ser auditáveis
   - Mantenha rastreabilidade das fontes
";

const ANSWER_RULES: [&str; 5] = [
    "Use APENAS informações presentes no contexto acima",
    "Cite as fontes usando [número] conforme aparecem no contexto",
    "Se a informação não estiver no contexto, responda com a política de não resposta",
    "Seja preciso, objetivo e fundamentado",
    "Estruture a resposta de forma clara e profissional",
];

const REASONING_RULE: &str =
    "Inclua uma seção 'Raciocínio:' explicando seu processo de análise";

/// Render evidence as the numbered context block.
///
/// Each entry reads `[i] Fonte: … | Página: … | Tipo: … | Precedência: …`
/// followed by `Conteúdo: …`. Page and precedence are omitted when absent
/// or zero.
pub fn build_context(evidence: &[Evidence]) -> String {
    evidence
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut part = format!("[{}] Fonte: {}", i + 1, e.source);
            if let Some(page) = e.page.filter(|p| *p > 0) {
                part.push_str(&format!(" | Página: {}", page));
            }
            part.push_str(&format!(" | Tipo: {}", e.document_type));
            if let Some(precedence) = e.precedence.filter(|p| *p > 0) {
                part.push_str(&format!(" | Precedência: {}", precedence));
            }
            part.push_str(&format!("\nConteúdo: {}\n", e.excerpt));
            part
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Render the user prompt for answer generation.
///
/// `additional_instructions` is placed after the numbered rules when
/// non-empty.
pub fn format_answer_prompt(
    question: &str,
    context: &str,
    include_reasoning: bool,
    additional_instructions: &str,
) -> String {
    let mut rules: Vec<&str> = ANSWER_RULES.to_vec();
    if include_reasoning {
        rules.push(REASONING_RULE);
    }
    let rules = rules
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "Você deve responder à seguinte pergunta baseando-se EXCLUSIVAMENTE no contexto fornecido.\n\n\
         ## CONTEXTO:\n{}\n\n\
         ## PERGUNTA:\n{}\n\n\
         ## INSTRUÇÕES:\n{}\n",
        context, question, rules
    );

    let extra = additional_instructions.trim();
    if !extra.is_empty() {
        prompt.push('\n');
        prompt.push_str(extra);
        prompt.push('\n');
    }

    prompt.push_str("\n## SUA RESPOSTA:\n");
    prompt
}

/// Extract the text after the first reasoning marker present in `answer`.
///
/// Markers are tried in order: `Raciocínio:`, `Justificativa:`,
/// `Fundamentação:`. Returns `None` when none appears or nothing follows.
pub fn extract_reasoning(answer: &str) -> Option<String> {
    REASONING_MARKERS.iter().find_map(|marker| {
        answer
            .split_once(marker)
            .map(|(_, rest)| rest.trim().to_string())
            .filter(|r| !r.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(source: &str, page: Option<u32>, precedence: Option<u32>) -> Evidence {
        Evidence {
            source: source.to_string(),
            page,
            document_type: "Resolução".to_string(),
            excerpt: "O prazo é de 30 dias.".to_string(),
            score: 0.8,
            precedence,
        }
    }

    #[test]
    fn test_build_context_format() {
        let context = build_context(&[
            evidence("Resolução 5.000", Some(3), Some(1)),
            evidence("Portaria 10", None, None),
        ]);
        assert_eq!(
            context,
            "[1] Fonte: Resolução 5.000 | Página: 3 | Tipo: Resolução | Precedência: 1\n\
             Conteúdo: O prazo é de 30 dias.\n\
             \n---\n\
             [2] Fonte: Portaria 10 | Tipo: Resolução\n\
             Conteúdo: O prazo é de 30 dias.\n"
        );
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_answer_prompt_sections() {
        let prompt = format_answer_prompt("Qual o prazo?", "[1] O prazo é de 30 dias", false, "");
        assert!(prompt.contains("## CONTEXTO:\n[1] O prazo é de 30 dias"));
        assert!(prompt.contains("## PERGUNTA:\nQual o prazo?"));
        assert!(prompt.contains("5. Estruture a resposta"));
        assert!(!prompt.contains("6. "));
        assert!(prompt.ends_with("## SUA RESPOSTA:\n"));
    }

    #[test]
    fn test_answer_prompt_with_reasoning_and_extra() {
        let prompt = format_answer_prompt("Qual o prazo?", "ctx", true, "Responda em uma frase.");
        assert!(prompt.contains("6. Inclua uma seção 'Raciocínio:'"));
        let extra_at = prompt.find("Responda em uma frase.").unwrap();
        let answer_at = prompt.find("## SUA RESPOSTA:").unwrap();
        assert!(extra_at < answer_at);
    }

    #[test]
    fn test_extract_reasoning() {
        assert_eq!(
            extract_reasoning("O prazo é 30 dias [1].\n\nRaciocínio: conforme o art. 2."),
            Some("conforme o art. 2.".to_string())
        );
        assert_eq!(
            extract_reasoning("Resposta. Fundamentação: art. 5"),
            Some("art. 5".to_string())
        );
        assert_eq!(extract_reasoning("Sem seção de análise."), None);
        assert_eq!(extract_reasoning("Raciocínio:   "), None);
    }
}
