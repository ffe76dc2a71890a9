//! Common constants used throughout normativa-core.
//!
//! Centralizes file names, metadata defaults and the fixed user-facing
//! messages produced by the answer stage.

// ============================================================================
// Paths
// ============================================================================

/// The name of the global configuration directory (`~/.normativa/`).
pub const NORMATIVA_HOME_DIR: &str = ".normativa";

/// Global configuration filename inside [`NORMATIVA_HOME_DIR`].
pub const CONFIG_FILENAME: &str = "config.yaml";

// ============================================================================
// Metadata Defaults
// ============================================================================

/// Status assumed for documents that carry no `status` metadata.
pub const DEFAULT_DOCUMENT_STATUS: &str = "Vigente";

/// Precedence assumed by the precedence ceiling filter when a document has none.
///
/// Lower values mean higher legal authority, so a missing precedence ranks last.
pub const MISSING_PRECEDENCE: u32 = 99;

/// Lower bound used when a document has no `vigencia_inicio`.
pub const OPEN_VALIDITY_START: &str = "";

/// Upper bound used when a document has no `vigencia_fim`.
pub const OPEN_VALIDITY_END: &str = "9999-12-31";

/// Source label for evidence whose document has no source metadata.
pub const UNKNOWN_SOURCE: &str = "Desconhecido";

/// Document type label for evidence whose document has no type metadata.
pub const DEFAULT_EVIDENCE_TYPE: &str = "Normativo";

/// Maximum characters kept in an evidence excerpt.
pub const EVIDENCE_EXCERPT_CHARS: usize = 800;

// ============================================================================
// Question Limits
// ============================================================================

/// Minimum accepted question length in characters.
pub const MIN_QUESTION_CHARS: usize = 5;

/// Maximum accepted question length in characters.
pub const MAX_QUESTION_CHARS: usize = 1000;

// ============================================================================
// Fixed Answer Messages
// ============================================================================

/// Answer returned when retrieval yields no documents.
pub const NO_DOCUMENTS_ANSWER: &str =
    "❌ NÃO LOCALIZADO: Não foi encontrada informação sobre o tema nos documentos consultados.";

/// Warning attached to [`NO_DOCUMENTS_ANSWER`].
pub const NO_DOCUMENTS_WARNING: &str = "Nenhuma evidência retornada.";

/// Answer returned when the question fails the length check.
pub const INVALID_QUESTION_ANSWER: &str =
    "❌ PERGUNTA INVÁLIDA: A pergunta deve ter entre 5 e 1000 caracteres.";

/// Warning attached to [`INVALID_QUESTION_ANSWER`].
pub const INVALID_QUESTION_WARNING: &str = "Pergunta não atende aos critérios mínimos";

/// Warning added when fewer than two documents support the answer.
pub const FEW_DOCUMENTS_WARNING: &str =
    "Poucos documentos encontrados. Resposta pode ser incompleta.";

/// Prefix of the answer returned when generation fails.
pub const GENERATION_ERROR_PREFIX: &str = "❌ ERRO NO PROCESSAMENTO";
