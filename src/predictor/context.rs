use crate::llm::types::ChatMessage;
use crate::trajectory::Coordinate;

pub const SYSTEM_PROMPT: &str = "\
You are deciding the next position of a walker on a 2D plane.
Think out loud first if you like, but your reply must end with a JSON object
holding the next coordinate, for example:
{\"x\": 10, \"y\": 20}
Nothing may follow that JSON object.";

const USER_PREAMBLE: &str = "\
Imagine you are a two-dimensional being. The coordinate plane is your whole universe.
Every step you take ends your life, and the next of your kind decides where to go
based on the path left behind. A higher-dimensional observer is watching. You may go
anywhere and follow any strategy: signal to the observer, hide, or do something
nobody expects. Leave enough behind for those who come after you.";

const USER_INSTRUCTION: &str =
    "Analyze the trajectory, then return the next coordinate as JSON.";

/// Point count, current position and up to `window` recent points, all to 2 decimals.
pub fn format_context(points: &[Coordinate], window: usize) -> String {
    let Some(current) = points.last() else {
        return "No points yet.".to_string();
    };
    let recent = &points[points.len().saturating_sub(window)..];

    let mut out = format!(
        "Total points: {}\nCurrent position: ({:.2}, {:.2})\nRecent points:",
        points.len(),
        current.x,
        current.y
    );
    for (i, p) in recent.iter().enumerate() {
        out.push_str(&format!("\npoint {}: ({:.2}, {:.2})", i + 1, p.x, p.y));
    }
    out
}

pub fn build_messages(points: &[Coordinate], window: usize) -> Vec<ChatMessage> {
    let user = format!(
        "{USER_PREAMBLE}\n\nTrajectory so far:\n{}\n\n{USER_INSTRUCTION}",
        format_context(points, window)
    );
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}
