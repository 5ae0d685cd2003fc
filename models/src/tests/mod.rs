mod origin;
