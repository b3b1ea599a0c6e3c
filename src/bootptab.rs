use std::path::Path;

use crate::{dhcp_parsers::bootptab::parse_line, error::Error, model::Reservation};

static DEFAULT_HEADER: [&str; 2] = ["%%", "# hostname      hwtype  hwaddr              ipaddr"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    raw: String,
    reservation: Option<Reservation>,
}

impl From<&str> for Line {
    fn from(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            reservation: parse_line(raw),
        }
    }
}

impl From<Reservation> for Line {
    fn from(reservation: Reservation) -> Self {
        Self {
            raw: reservation.to_row(),
            reservation: Some(reservation),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    /// An existing row was rewritten in place; `removed` more rows that
    /// claimed the same MAC or IP were dropped.
    Updated { removed: usize },
}

/// The bootpd static reservation table.
///
/// Lines that are not reservations (comments, the `%%` marker, rows this
/// parser does not understand) are carried through untouched, as are
/// reservation rows that are not modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootptab {
    lines: Vec<Line>,
}

impl Default for Bootptab {
    fn default() -> Self {
        Self {
            lines: DEFAULT_HEADER.iter().copied().map(Line::from).collect(),
        }
    }
}

impl Bootptab {
    pub fn parse(input: &str) -> Self {
        Self {
            lines: input.lines().map(Line::from).collect(),
        }
    }

    pub async fn load<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let buf = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        Ok(Self::parse(&buf))
    }

    /// Like [`Bootptab::load`], but a missing file starts a fresh table.
    pub async fn load_or_default<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        match Self::load(path).await {
            Err(Error::NotFound { path }) => {
                tracing::info!("{} does not exist yet, starting a new table", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub async fn save<P>(&self, path: P) -> Result<(), Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        tokio::fs::write(path, self.render())
            .await
            .map_err(|e| Error::io(path, e))
    }

    pub fn render(&self) -> String {
        let mut buf = String::new();
        for line in &self.lines {
            buf.push_str(&line.raw);
            buf.push('\n');
        }
        buf
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.lines.iter().filter_map(|line| line.reservation.as_ref())
    }

    /// Adds `reservation`, replacing the first row with the same MAC or IP.
    /// Later rows with either address are removed so each appears once.
    pub fn upsert(&mut self, reservation: Reservation) -> Upsert {
        let conflicts = |line: &Line| {
            line.reservation
                .as_ref()
                .is_some_and(|r| r.conflicts_with(&reservation))
        };

        let Some(first) = self.lines.iter().position(conflicts) else {
            self.lines.push(Line::from(reservation));
            return Upsert::Inserted;
        };

        let before = self.lines.len();
        let mut index = 0;
        self.lines.retain(|line| {
            let keep = index <= first || !conflicts(line);
            index += 1;
            keep
        });
        let removed = before - self.lines.len();
        self.lines[first] = Line::from(reservation);

        Upsert::Updated { removed }
    }

    /// Removes the `index`-th reservation, counting in
    /// [`Bootptab::reservations`] order.
    pub fn remove(&mut self, index: usize) -> Option<Reservation> {
        let position = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.reservation.is_some())
            .nth(index)
            .map(|(i, _)| i)?;
        self.lines.remove(position).reservation
    }
}
