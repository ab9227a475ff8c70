//! Prompt builders for the two generation calls the engine makes: the
//! empathetic chat reply and the single-word emotion classification.

/// Builds the chat prompt from the session's context window (the last few
/// turns, already formatted as `role: text` lines) and the new utterance.
pub fn chat_prompt(context_window: &str, utterance: &str) -> String {
    format!(
        "Eres Coprodelito, un asistente emocional para jóvenes. Contexto previo:\n\
         {context_window}\n\
         \n\
         Nuevo mensaje: \"{utterance}\"\n\
         \n\
         Responde de forma empática y natural, identificando emociones cuando sea nuevo tema."
    )
}

/// Asks for exactly one word naming the dominant emotion of the utterance.
pub fn emotion_word_prompt(utterance: &str) -> String {
    format!("Identifica la emoción principal en: '{utterance}'. Responde solo con una palabra.")
}
