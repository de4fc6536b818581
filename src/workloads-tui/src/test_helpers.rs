use ratatui::Terminal;
use ratatui::backend::TestBackend;

/// Flatten the terminal buffer into one string
pub fn buffer_content(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer().clone();
    buffer.content().iter().map(|c| c.symbol()).collect()
}

/// Assert that the terminal buffer contains the given text
pub fn assert_buffer_contains(terminal: &Terminal<TestBackend>, text: &str) {
    let content = buffer_content(terminal);
    assert!(
        content.contains(text),
        "Buffer does not contain '{text}'.\nBuffer content: {content}"
    );
}
