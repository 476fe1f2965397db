//! Interactive commands read from stdin

/// One line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Refresh,
    TogglePause,
    Retry,
    /// Replace the free-text search; empty clears it
    Search(String),
    /// Exact request id filter; empty clears it
    RequestId(String),
    ToggleSuccesses,
    ToggleView,
    Window,
    ScrollDown,
    ScrollUp,
    Top,
    Status,
    Clear,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  r            refresh now
  p            pause / resume live tailing
  retry        re-enable polling after failures
  /text        search (a bare / clears)
  #id          filter by request id (a bare # clears)
  s            show / hide successful events
  v            switch between logs and network view
  w            print the current window
  j / k        scroll one page older / newer
  t            jump to newest
  st           engine status
  clear        drop buffered events
  q            quit";

/// Parse a line; `None` for unrecognised input
pub fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if let Some(text) = line.strip_prefix('/') {
        return Some(Input::Search(text.trim().to_string()));
    }
    if let Some(id) = line.strip_prefix('#') {
        return Some(Input::RequestId(id.trim().to_string()));
    }

    let input = match line {
        "r" | "refresh" => Input::Refresh,
        "p" | "pause" | "resume" => Input::TogglePause,
        "retry" => Input::Retry,
        "s" | "successes" => Input::ToggleSuccesses,
        "v" | "view" => Input::ToggleView,
        "w" | "window" | "" => Input::Window,
        "j" | "down" => Input::ScrollDown,
        "k" | "up" => Input::ScrollUp,
        "t" | "top" => Input::Top,
        "st" | "status" => Input::Status,
        "clear" => Input::Clear,
        "h" | "help" | "?" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        _ => return None,
    };
    Some(input)
}
