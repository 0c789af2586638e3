/// Connection rules for architecture diagrams. Shared by the repair prompts and
/// mirrored by the heuristic fallback in `fixer::fallback`.
pub const RULES: &str = "\
1. Arrow direction = dependency. The arrow points from the initiator toward the provider \
(e.g. \"User\" -> \"Web App\" -> \"Order Service\" -> \"Orders DB\").\n\
2. Actors initiate. An actor connects to the web application, gateway or service it uses; \
nothing points at an actor.\n\
3. Databases are reached, not reaching. A database receives edges from the services that \
read or write it. Frontends should go through a service rather than straight to a data store.\n\
4. Services are never islands. Every service has at least one caller or one dependency.\n\
5. Caches, queues and gateways sit next to the services that use them. Connect them from \
that service, not from an actor.\n\
6. Only use node ids that already exist. Never invent nodes, never connect a node to itself, \
never repeat an existing connection.\n\
7. Prefer acyclic dependencies. If two services call each other, an intermediary or an \
event-driven edge usually expresses the intent better.";
