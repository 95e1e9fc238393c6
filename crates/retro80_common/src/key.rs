/// Logical keys shared between the frontends and the machines.
///
/// Frontends map their native keycodes onto this set; anything without a
/// mapping becomes `None` and is ignored by the machines.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Key {
    None,
    Num1,
    Num2,
    Num3,
    Num4,
    Q,
    W,
    E,
    R,
    A,
    S,
    D,
    F,
    Z,
    X,
    C,
    V,
    J,
    K,
    L,
    P,
    T,
    Left,
    Right,
    Up,
    Down,
    Space,
    Escape,
}
